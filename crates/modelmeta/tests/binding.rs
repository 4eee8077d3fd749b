use std::error::Error as StdError;
use std::fmt;

use chrono::NaiveDateTime;
use modelmeta::prelude::*;
use modelmeta::{bind_path, project};

#[derive(Debug, Default, PartialEq)]
struct Cents(i64);

#[derive(Debug)]
struct BadMoney(String);

impl fmt::Display for BadMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a money amount: {}", self.0)
    }
}

impl StdError for BadMoney {}

impl Decode for Cents {
    fn decode(&mut self, raw: Value) -> std::result::Result<(), DecodeError> {
        match raw {
            Value::BigInt(cents) => {
                self.0 = cents;
                Ok(())
            }
            Value::Text(text) => {
                let amount: f64 = text
                    .trim_start_matches('$')
                    .parse()
                    .map_err(|_| BadMoney(text.clone()))?;
                self.0 = (amount * 100.0).round() as i64;
                Ok(())
            }
            other => Err(Box::new(BadMoney(other.kind_name().to_string()))),
        }
    }

    fn encode(&self) -> Value {
        Value::BigInt(self.0)
    }
}

decodable!(Cents);

#[derive(Model, Default, Debug)]
struct Invoice {
    id: i64,
    total: Cents,
    discount: Option<Cents>,
    note: Option<String>,
    issued_at: Option<NaiveDateTime>,
    paid: bool,
}

#[derive(Model, Default, Debug)]
struct Stamp {
    created_by: String,
}

#[derive(Model, Default, Debug)]
struct Ticket {
    id: i64,
    #[model("embedded;embedded_prefix:stamp_")]
    stamp: Stamp,
    watchers: Vec<Watcher>,
}

#[derive(Model, Default, Debug)]
struct Watcher {
    id: i64,
    ticket_id: i64,
}

#[test]
fn decode_hooks_are_detected() {
    let cx = Context::default();
    let invoices = cx.resolve::<Invoice>();

    let total = invoices.field_by_name("total").unwrap();
    assert!(total.has_decode_hook);
    assert!(total.is_scalar_storable);
    assert!(invoices.field_by_name("discount").unwrap().has_decode_hook);
    assert!(!invoices.field_by_name("issued_at").unwrap().has_decode_hook);
    assert!(invoices.field_by_name("issued_at").unwrap().is_scalar_storable);
}

#[test]
fn numeric_text_converts_into_integer_field() {
    let cx = Context::default();
    let mut invoice = Invoice::default();
    cx.bind(&mut invoice, "id", "42").unwrap();
    assert_eq!(invoice.id, 42);
}

#[test]
fn inconvertible_value_is_reported_with_field_name() {
    let cx = Context::default();
    let mut invoice = Invoice::default();
    let err = cx.bind(&mut invoice, "id", true).unwrap_err();
    assert!(err.is_inconvertible());
    assert_eq!(err.field(), "id");
    assert_eq!(invoice.id, 0);

    let err = cx.bind(&mut invoice, "paid", Value::Null).unwrap_err();
    assert!(err.is_inconvertible());
}

#[test]
fn blank_flag_tracks_bound_value() {
    let cx = Context::default();
    let mut invoice = Invoice::default();
    {
        let mut views = cx.fields_of(Some(&mut invoice));
        let id = views.get_mut("id").unwrap();
        assert!(id.is_blank());

        id.set(0_i64).unwrap();
        assert!(id.is_blank());

        id.set(5_i64).unwrap();
        assert!(!id.is_blank());
        assert_eq!(id.value(), Some(Value::BigInt(5)));

        let paid = views.get_mut("paid").unwrap();
        paid.set(1_i64).unwrap();
        assert!(!paid.is_blank());
    }
    assert_eq!(invoice.id, 5);
    assert!(invoice.paid);
}

#[test]
fn decode_hook_receives_raw_value() {
    let cx = Context::default();
    let mut invoice = Invoice::default();

    cx.bind(&mut invoice, "total", "$12.34").unwrap();
    assert_eq!(invoice.total, Cents(1234));

    cx.bind(&mut invoice, "discount", Some("$1.00")).unwrap();
    assert_eq!(invoice.discount, Some(Cents(100)));

    cx.bind(&mut invoice, "discount", None::<i64>).unwrap();
    assert_eq!(invoice.discount, None);
}

#[test]
fn decode_hook_errors_propagate_verbatim() {
    let cx = Context::default();
    let mut invoice = Invoice::default();
    let err = cx.bind(&mut invoice, "total", true).unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    let source = err.source().unwrap();
    let bad = source.downcast_ref::<BadMoney>().unwrap();
    assert_eq!(bad.0, "bool");
}

#[test]
fn optional_and_temporal_fields() {
    let cx = Context::default();
    let mut invoice = Invoice::default();

    cx.bind(&mut invoice, "note", "net 30").unwrap();
    assert_eq!(invoice.note.as_deref(), Some("net 30"));
    cx.bind(&mut invoice, "note", Value::Null).unwrap();
    assert_eq!(invoice.note, None);

    cx.bind(&mut invoice, "issued_at", "2024-01-02 03:04:05").unwrap();
    assert_eq!(
        invoice.issued_at.map(|t| t.to_string()).as_deref(),
        Some("2024-01-02 03:04:05")
    );
}

#[test]
fn placeholder_projection_is_blank_and_detached() {
    let cx = Context::default();
    let mut views = cx.fields_of::<Invoice>(None);
    assert_eq!(views.len(), 6);
    assert!(views.values().all(|v| v.is_blank() && !v.is_attached()));

    let err = views.get_mut("id").unwrap().set(1_i64).unwrap_err();
    assert!(err.is_invalid_target());
}

#[test]
fn projection_of_another_model_is_detached() {
    let cx = Context::default();
    let invoices = cx.resolve::<Invoice>();
    let mut stamp = Stamp::default();
    let views = project(Some(&mut stamp as &mut dyn Record), &invoices);
    assert!(views.values().all(|v| !v.is_attached()));
}

#[test]
fn projection_reaches_embedded_and_relationship_fields() {
    let cx = Context::default();
    let mut ticket = Ticket::default();
    ticket.stamp.created_by = "ops".to_string();

    let views = cx.fields_of(Some(&mut ticket));
    let created_by = &views["stamp_created_by"];
    assert!(created_by.is_attached());
    assert!(!created_by.is_blank());
    assert_eq!(created_by.value(), Some(Value::Text("ops".into())));

    let watchers = &views["watchers"];
    assert!(watchers.is_attached());
    assert!(watchers.is_blank());
}

#[test]
fn binding_through_embedded_path() {
    let cx = Context::default();
    let tickets = cx.resolve::<Ticket>();
    let mut ticket = Ticket::default();

    cx.bind(&mut ticket, "stamp_created_by", "alice").unwrap();
    assert_eq!(ticket.stamp.created_by, "alice");

    let descriptor = tickets.field_by_name("stamp_created_by").unwrap();
    let is_blank = bind_path(&mut ticket, descriptor, "").unwrap();
    assert!(is_blank);
    assert!(ticket.stamp.created_by.is_empty());
}

#[test]
fn unknown_field_is_invalid_target() {
    let cx = Context::default();
    let mut ticket = Ticket::default();
    let err = cx.bind(&mut ticket, "assignee", "bob").unwrap_err();
    assert!(err.is_invalid_target());
    assert_eq!(err.field(), "assignee");
}
