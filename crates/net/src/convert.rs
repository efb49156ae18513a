//! Conversions between proto types and domain types.

use auction_common::{BidResult, BidStatus, UnknownStatus};
use auction_proto::auction as pb;

// ---------------------------------------------------------------------------
// BidStatus
// ---------------------------------------------------------------------------

pub fn status_to_proto(status: BidStatus) -> pb::BidStatus {
    match status {
        BidStatus::Ok => pb::BidStatus::Ok,
        BidStatus::TooLow => pb::BidStatus::TooLow,
        BidStatus::AuctionOver => pb::BidStatus::AuctionOver,
    }
}

pub fn status_from_proto(raw: i32) -> Result<BidStatus, UnknownStatus> {
    match pb::BidStatus::try_from(raw) {
        Ok(pb::BidStatus::Ok) => Ok(BidStatus::Ok),
        Ok(pb::BidStatus::TooLow) => Ok(BidStatus::TooLow),
        Ok(pb::BidStatus::AuctionOver) => Ok(BidStatus::AuctionOver),
        Err(_) => Err(UnknownStatus(raw)),
    }
}

// ---------------------------------------------------------------------------
// BidResult
// ---------------------------------------------------------------------------

pub fn result_to_proto(result: &BidResult) -> pb::BidResult {
    pb::BidResult {
        amount: result.amount,
        bidder_id: result.bidder_id.clone(),
        status: status_to_proto(result.status) as i32,
    }
}

pub fn result_from_proto(proto: pb::BidResult) -> Result<BidResult, UnknownStatus> {
    Ok(BidResult {
        amount: proto.amount,
        bidder_id: proto.bidder_id,
        status: status_from_proto(proto.status)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        for status in [BidStatus::Ok, BidStatus::TooLow, BidStatus::AuctionOver] {
            let raw = status_to_proto(status) as i32;
            assert_eq!(status_from_proto(raw), Ok(status));
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert_eq!(status_from_proto(42), Err(UnknownStatus(42)));
    }

    #[test]
    fn test_result_from_proto() {
        let proto = pb::BidResult {
            amount: 17,
            bidder_id: "alice".into(),
            status: pb::BidStatus::AuctionOver as i32,
        };
        assert_eq!(
            result_from_proto(proto).unwrap(),
            BidResult::new(17, "alice", BidStatus::AuctionOver)
        );
    }
}
