use serde::{Deserialize, Serialize};

/// Gates outbound wire transfers system-wide.
pub const ALLOW_WIRE_TRANSFER: &str = "allow_wire_transfer";
/// Gates outbound ACH transfers system-wide.
pub const ALLOW_ACH: &str = "allow_ach";
/// Gates bill payments system-wide.
pub const ALLOW_BILL_PAY: &str = "allow_bill_pay";

/// The flags the admin console knows how to edit.
pub const KNOWN_FLAGS: [&str; 3] = [ALLOW_WIRE_TRANSFER, ALLOW_ACH, ALLOW_BILL_PAY];

/// A named boolean switch read by the transfer orchestrator. A flag that is
/// absent from storage reads as disabled (fail-closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
}

/// Human-readable label used in "currently disabled" messages.
pub fn flag_label(name: &str) -> &str {
    match name {
        ALLOW_WIRE_TRANSFER => "Wire transfers",
        ALLOW_ACH => "ACH transfers",
        ALLOW_BILL_PAY => "Bill payments",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_flags_have_labels() {
        for name in KNOWN_FLAGS {
            assert_ne!(flag_label(name), name);
        }
        assert_eq!(flag_label("allow_teleport"), "allow_teleport");
    }
}
