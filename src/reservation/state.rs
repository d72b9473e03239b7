//! Reservation and slot state definitions
//!
//! Statuses are stored as TEXT in PostgreSQL; every transition between them
//! is expressed as a conditional UPDATE so the database evaluates the current
//! state at write time. The enums here exist so the application never spells
//! a status string twice.

use std::fmt;

/// Slot states: one numbered unit of raffle inventory within a draw.
///
/// `available → reserved` happens only through the claim statement,
/// `reserved → available` only through the conditioned release, and
/// `reserved → sold` only through the conditioned sale. `sold` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    Available,
    Reserved,
    Sold,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Sold => "sold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(SlotStatus::Available),
            "reserved" => Some(SlotStatus::Reserved),
            "sold" => Some(SlotStatus::Sold),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Sold)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reservation states.
///
/// Terminal states: `paid`, `expired`, `cancelled`. `paid` wins any race
/// against expiry or cancellation; there is no backward transition from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationStatus {
    /// Numbers claimed, waiting for a payment to start; subject to TTL expiry.
    Active,
    /// A PIX charge exists for this reservation.
    PendingPayment,
    /// Payment approved; the numbers are sold.
    Paid,
    /// TTL elapsed before payment; numbers released by the sweep.
    Expired,
    /// Explicitly cancelled by the owner or a failed payment.
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::PendingPayment => "pending_payment",
            ReservationStatus::Paid => "paid",
            ReservationStatus::Expired => "expired",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ReservationStatus::Active),
            "pending_payment" => Some(ReservationStatus::PendingPayment),
            "paid" => Some(ReservationStatus::Paid),
            "expired" => Some(ReservationStatus::Expired),
            "cancelled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    /// No more transitions possible from this state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Paid | ReservationStatus::Expired | ReservationStatus::Cancelled
        )
    }

    /// Still holds claims on its slots (and may be paid for)
    #[inline]
    pub fn is_claiming(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Active | ReservationStatus::PendingPayment
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_status_roundtrip() {
        for status in [SlotStatus::Available, SlotStatus::Reserved, SlotStatus::Sold] {
            let recovered = SlotStatus::from_str(status.as_str()).unwrap();
            assert_eq!(status, recovered);
        }
    }

    #[test]
    fn test_slot_status_terminal() {
        assert!(SlotStatus::Sold.is_terminal());
        assert!(!SlotStatus::Available.is_terminal());
        assert!(!SlotStatus::Reserved.is_terminal());
    }

    #[test]
    fn test_reservation_status_roundtrip() {
        let states = [
            ReservationStatus::Active,
            ReservationStatus::PendingPayment,
            ReservationStatus::Paid,
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
        ];
        for status in states {
            let recovered = ReservationStatus::from_str(status.as_str()).unwrap();
            assert_eq!(status, recovered);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(ReservationStatus::Paid.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());

        assert!(!ReservationStatus::Active.is_terminal());
        assert!(!ReservationStatus::PendingPayment.is_terminal());
    }

    #[test]
    fn test_claiming_states() {
        assert!(ReservationStatus::Active.is_claiming());
        assert!(ReservationStatus::PendingPayment.is_claiming());

        assert!(!ReservationStatus::Paid.is_claiming());
        assert!(!ReservationStatus::Expired.is_claiming());
        assert!(!ReservationStatus::Cancelled.is_claiming());
    }

    #[test]
    fn test_invalid_status_string() {
        assert!(SlotStatus::from_str("pending").is_none());
        assert!(ReservationStatus::from_str("open").is_none());
    }
}
