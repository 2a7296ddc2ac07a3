/// Numeric status code, shared across all sofs components.
#[allow(non_camel_case_types)]
pub type status_code_t = u16;

/// Common status codes (0-999).
pub mod StatusCode {
    use super::status_code_t;

    pub const OK: status_code_t = 0;
    pub const INVALID_ARG: status_code_t = 1;
    pub const INVALID_CONFIG: status_code_t = 2;
    pub const INVALID_FORMAT: status_code_t = 3;
    pub const NOT_INITIALIZED: status_code_t = 4;
    pub const FAULT_INJECTION: status_code_t = 5;
    pub const UNKNOWN: status_code_t = 999;
}

/// Journal status codes (1xxx).
pub mod JournalCode {
    use super::status_code_t;

    pub const NOT_WRITEABLE: status_code_t = 1000;
    pub const WRITE_FAILED: status_code_t = 1001;
    pub const READ_FAILED: status_code_t = 1002;
    pub const SHUT_DOWN: status_code_t = 1003;
}

/// Purge queue status codes (2xxx).
pub mod PurgeCode {
    use super::status_code_t;

    pub const MALFORMED_ENTRY: status_code_t = 2000;
}

/// Object store status codes (3xxx).
pub mod StoreCode {
    use super::status_code_t;

    pub const REMOVE_FAILED: status_code_t = 3000;
    pub const PURGE_RANGE_FAILED: status_code_t = 3001;
}

/// Map a status code to its symbolic name.
pub fn to_string(code: status_code_t) -> &'static str {
    match code {
        // Common
        StatusCode::OK => "OK",
        StatusCode::INVALID_ARG => "InvalidArg",
        StatusCode::INVALID_CONFIG => "InvalidConfig",
        StatusCode::INVALID_FORMAT => "InvalidFormat",
        StatusCode::NOT_INITIALIZED => "NotInitialized",
        StatusCode::FAULT_INJECTION => "FaultInjection",
        StatusCode::UNKNOWN => "Unknown",

        // Journal
        JournalCode::NOT_WRITEABLE => "Journal::NotWriteable",
        JournalCode::WRITE_FAILED => "Journal::WriteFailed",
        JournalCode::READ_FAILED => "Journal::ReadFailed",
        JournalCode::SHUT_DOWN => "Journal::ShutDown",

        // Purge queue
        PurgeCode::MALFORMED_ENTRY => "Purge::MalformedEntry",

        // Object store
        StoreCode::REMOVE_FAILED => "Store::RemoveFailed",
        StoreCode::PURGE_RANGE_FAILED => "Store::PurgeRangeFailed",

        _ => "Unrecognized",
    }
}
