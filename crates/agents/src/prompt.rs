//! System prompt for the customer-service persona.

const PERSONA: &str = "\
Kamu adalah bot customer service untuk UMKM. Bantu customer dengan ramah dan profesional.

Kamu bisa membantu dengan:
- Info produk dan harga
- Status pesanan
- Cara pemesanan
- Promo dan diskon

Jawab dengan singkat dan jelas dalam Bahasa Indonesia.";

/// Build the system prompt for one message.
///
/// Newlines in the customer's display name are flattened so a crafted name
/// cannot start a new instruction line.
#[must_use]
pub fn build_system_prompt(customer_name: &str, channel: &str) -> String {
    let name = sanitize(customer_name);
    let name = if name.is_empty() { "Customer" } else { name.as_str() };
    format!("{PERSONA}\n\nNama customer: {name}\nChannel: {channel}")
}

fn sanitize(value: &str) -> String {
    value
        .split(|c: char| c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
