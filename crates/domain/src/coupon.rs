//! Pure coupon validation. Never touches `used_count`; the increment happens
//! inside the order-commit transaction.

use chrono::{DateTime, Utc};
use common::Money;
use store::CouponRecord;

use crate::error::{DomainError, Result};

/// Validates a coupon against a cart subtotal at a point in time and returns
/// the discount percent to apply.
///
/// An inactive coupon reads as expired, same as one outside its validity
/// window.
pub fn validate_coupon(
    coupon: &CouponRecord,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<u8> {
    if !coupon.active || now < coupon.valid_from || now > coupon.valid_to {
        return Err(DomainError::CouponExpired(coupon.code.clone()));
    }
    if coupon.max_uses > 0 && coupon.used_count >= coupon.max_uses {
        return Err(DomainError::CouponExhausted(coupon.code.clone()));
    }
    if subtotal < coupon.min_order_amount {
        return Err(DomainError::MinimumOrderNotMet {
            required: coupon.min_order_amount,
        });
    }
    Ok(coupon.discount_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::CouponId;

    fn coupon() -> CouponRecord {
        CouponRecord {
            id: CouponId::new(),
            code: "SAVE10".to_string(),
            valid_from: Utc::now() - Duration::days(7),
            valid_to: Utc::now() + Duration::days(7),
            discount_percent: 10,
            active: true,
            max_uses: 0,
            used_count: 0,
            min_order_amount: Money::zero(),
        }
    }

    #[test]
    fn valid_coupon_returns_discount() {
        let result = validate_coupon(&coupon(), Money::from_rupees(200), Utc::now());
        assert_eq!(result.unwrap(), 10);
    }

    #[test]
    fn inactive_coupon_reads_as_expired() {
        let mut c = coupon();
        c.active = false;
        assert!(matches!(
            validate_coupon(&c, Money::from_rupees(200), Utc::now()),
            Err(DomainError::CouponExpired(_))
        ));
    }

    #[test]
    fn coupon_outside_window_is_expired() {
        let c = coupon();
        let before = c.valid_from - Duration::hours(1);
        let after = c.valid_to + Duration::hours(1);
        assert!(matches!(
            validate_coupon(&c, Money::from_rupees(200), before),
            Err(DomainError::CouponExpired(_))
        ));
        assert!(matches!(
            validate_coupon(&c, Money::from_rupees(200), after),
            Err(DomainError::CouponExpired(_))
        ));
    }

    #[test]
    fn exhausted_coupon_rejected() {
        let mut c = coupon();
        c.max_uses = 5;
        c.used_count = 5;
        assert!(matches!(
            validate_coupon(&c, Money::from_rupees(200), Utc::now()),
            Err(DomainError::CouponExhausted(_))
        ));
    }

    #[test]
    fn zero_max_uses_means_unlimited() {
        let mut c = coupon();
        c.max_uses = 0;
        c.used_count = 1_000_000;
        assert!(validate_coupon(&c, Money::from_rupees(200), Utc::now()).is_ok());
    }

    #[test]
    fn subtotal_below_minimum_rejected() {
        let mut c = coupon();
        c.min_order_amount = Money::from_rupees(500);
        let result = validate_coupon(&c, Money::from_rupees(200), Utc::now());
        assert!(matches!(
            result,
            Err(DomainError::MinimumOrderNotMet { required }) if required == Money::from_rupees(500)
        ));
    }

    #[test]
    fn subtotal_at_minimum_accepted() {
        let mut c = coupon();
        c.min_order_amount = Money::from_rupees(200);
        assert!(validate_coupon(&c, Money::from_rupees(200), Utc::now()).is_ok());
    }
}
