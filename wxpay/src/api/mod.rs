//! Gateway operations.
//!
//! Each submodule exposes an operation type implementing
//! [`WxpayRequest`](crate::request::WxpayRequest) together with its typed
//! options.
//!
//! - [`query`] - order status lookup (`/pay/orderquery`)
//! - [`refund`] - refund of a paid order (`/secapi/pay/refund`, client certificate)
//! - [`transfer`] - payout to a user's balance (`/mmpaymkttransfers/promotion/transfers`, client certificate)
//! - [`unifiedorder`] - prepay order creation (`/pay/unifiedorder`)

use crate::error::MissingParameterError;
use crate::schema;

/// Defines a closed set of wire string values.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $option:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every accepted wire value.
            pub const ALLOWED: &'static [&'static str] = &[$($wire),+];

            /// Returns the wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl $crate::schema::Presence for $name {}

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::error::InvalidParameterError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err($crate::schema::not_allowed($option, Self::ALLOWED, other)),
                }
            }
        }
    };
}

pub(crate) use wire_enum;

pub mod query;
pub mod refund;
pub mod transfer;
pub mod unifiedorder;

pub use query::{Query, QueryOptions};
pub use refund::{Refund, RefundAccount, RefundOptions};
pub use transfer::{CheckName, Transfer, TransferOptions};
pub use unifiedorder::{
    LimitPay, ProfitSharing, Receipt, TradeType, UnifiedOrder, UnifiedOrderOptions,
};

wire_enum! {
    /// Settlement currency.
    FeeType, "fee_type" {
        /// Chinese yuan, amounts in fen.
        Cny => "CNY",
    }
}

/// Requires `out_trade_no` when `transaction_id` is absent or empty.
pub(crate) fn require_order_reference(
    transaction_id: Option<&String>,
    out_trade_no: Option<&String>,
) -> Result<(), MissingParameterError> {
    if schema::present(transaction_id).is_none() && schema::present(out_trade_no).is_none() {
        return Err(MissingParameterError::new("out_trade_no").when("\"transaction_id\" is not set"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_type() {
        assert_eq!("CNY".parse::<FeeType>().unwrap(), FeeType::Cny);
        assert_eq!(FeeType::Cny.to_string(), "CNY");
        let err = "USD".parse::<FeeType>().unwrap_err();
        assert_eq!(err.expected, "one of \"CNY\"");
    }

    #[test]
    fn test_require_order_reference() {
        let id = String::from("x");
        assert!(require_order_reference(Some(&id), None).is_ok());
        assert!(require_order_reference(None, Some(&id)).is_ok());
        let err = require_order_reference(None, None).unwrap_err();
        assert_eq!(err.name, "out_trade_no");
        assert!(err.condition.is_some());

        let empty = String::new();
        let err = require_order_reference(Some(&empty), Some(&empty)).unwrap_err();
        assert_eq!(err.name, "out_trade_no");
        assert!(require_order_reference(Some(&empty), Some(&id)).is_ok());
    }
}
