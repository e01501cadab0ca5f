//! A small CRM session: contacts, communications and the event history.

use contactfold::{Channel, ContactKind, Direction, Store};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut store = Store::open(dir.path().join("crm-events.json"))?;
    store.initialize()?;

    let john = store.add_contact("John Smith", "john@example.com", ContactKind::Lead)?;
    println!("Added lead: {} <{}>", john.name, john.email);

    let sarah = store.add_contact("Sarah Johnson", "sarah@example.com", ContactKind::Customer)?;
    println!("Added customer: {} <{}>", sarah.name, sarah.email);

    let call = store.record_communication(
        john.id,
        Channel::Call,
        "Discussed pricing options",
        Direction::Outbound,
    )?;
    println!("Recorded {} with {}", call.channel, john.name);

    store.record_communication(
        sarah.id,
        Channel::Email,
        "Renewal question",
        Direction::Inbound,
    )?;

    store.update_communication(call.id, json!({"content": "Discussed pricing, sending a quote"}))?;
    println!("Corrected notes on communication {}", call.id);

    store.promote_lead_to_customer(john.id)?;
    println!("Promoted {} to customer", john.name);

    let stats = store.stats();
    println!(
        "\n{} contacts ({} leads, {} customers), {} communications",
        stats.total_contacts, stats.leads_count, stats.customers_count, stats.communications_count
    );

    println!("\nContacts:");
    for contact in store.contacts_stream().get().unwrap_or_default() {
        println!("  {}. {} [{}]", contact.id, contact.name, contact.kind);
    }

    println!("\nCommunications with {}:", john.name);
    for comm in store.communications_for_contact(john.id) {
        println!("  {} {}: {}", comm.timestamp.format("%H:%M:%S"), comm.channel, comm.content);
    }

    println!("\nHistory:");
    for entry in store.event_history() {
        println!("  {} {}", entry.event_type, entry.summary);
    }

    Ok(())
}
