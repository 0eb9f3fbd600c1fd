/// Longest stay accepted by availability, pricing and booking. Availability is
/// O(nights × bookings), so this bounds the cost of a single query.
pub const MAX_STAY_NIGHTS: i64 = 365;

pub const MAX_ID_LEN: usize = 128;
pub const MAX_NAME_LEN: usize = 128;
pub const MAX_PHONE_LEN: usize = 32;

/// Bytes of webhook body we are willing to buffer.
pub const MAX_WEBHOOK_BODY: usize = 64 * 1024;
