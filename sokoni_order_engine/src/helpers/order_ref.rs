/// Pulls the numeric order id out of a payment provider account reference, e.g. `ORDER-1041`.
pub fn extract_order_id_from_reference(reference: &str) -> Option<i64> {
    let order_ref = regex::Regex::new(r"ORDER-(\d+)").unwrap();
    order_ref.captures(reference).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse::<i64>().ok())
}
