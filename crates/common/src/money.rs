use serde::{Deserialize, Serialize};

/// Money amount represented in paise to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in paise (e.g., 10000 = ₹100.00)
    paise: i64,
}

impl Money {
    /// Creates a new Money amount from paise.
    pub fn from_paise(paise: i64) -> Self {
        Self { paise }
    }

    /// Creates a new Money amount from whole rupees.
    pub fn from_rupees(rupees: i64) -> Self {
        Self {
            paise: rupees * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { paise: 0 }
    }

    /// Returns the amount in paise.
    pub fn paise(&self) -> i64 {
        self.paise
    }

    /// Returns the rupee portion (whole number).
    pub fn rupees(&self) -> i64 {
        self.paise / 100
    }

    /// Returns the paise portion (remainder after whole rupees).
    pub fn paise_part(&self) -> i64 {
        self.paise.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.paise > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.paise == 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            paise: self.paise * quantity as i64,
        }
    }

    /// Applies a percentage discount, truncating fractional paise.
    pub fn discount(&self, percent: u8) -> Money {
        Money {
            paise: self.paise * percent as i64 / 100,
        }
    }

    /// Returns the amount as a decimal rupee value for wire formats that
    /// require it (carrier declared value, collectible amount).
    pub fn as_rupee_f64(&self) -> f64 {
        self.paise as f64 / 100.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.paise < 0 {
            write!(f, "-₹{}.{:02}", self.rupees().abs(), self.paise_part())
        } else {
            write!(f, "₹{}.{:02}", self.rupees(), self.paise_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise + rhs.paise,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            paise: self.paise - rhs.paise,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.paise += rhs.paise;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.paise -= rhs.paise;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_paise() {
        let money = Money::from_paise(1234);
        assert_eq!(money.paise(), 1234);
        assert_eq!(money.rupees(), 12);
        assert_eq!(money.paise_part(), 34);
    }

    #[test]
    fn from_rupees() {
        let money = Money::from_rupees(50);
        assert_eq!(money.paise(), 5000);
        assert_eq!(money.rupees(), 50);
        assert_eq!(money.paise_part(), 0);
    }

    #[test]
    fn display() {
        assert_eq!(Money::from_paise(1234).to_string(), "₹12.34");
        assert_eq!(Money::from_paise(100).to_string(), "₹1.00");
        assert_eq!(Money::from_paise(5).to_string(), "₹0.05");
        assert_eq!(Money::from_paise(-1234).to_string(), "-₹12.34");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(500);

        assert_eq!((a + b).paise(), 1500);
        assert_eq!((a - b).paise(), 500);
        assert_eq!(a.multiply(3).paise(), 3000);
    }

    #[test]
    fn percentage_discount() {
        // ₹200 at 10% -> ₹20 off
        let subtotal = Money::from_rupees(200);
        assert_eq!(subtotal.discount(10), Money::from_rupees(20));
        assert_eq!(subtotal - subtotal.discount(10), Money::from_rupees(180));
    }

    #[test]
    fn discount_truncates_fractional_paise() {
        let amount = Money::from_paise(999);
        assert_eq!(amount.discount(10).paise(), 99);
    }

    #[test]
    fn serialization_roundtrip() {
        let money = Money::from_paise(4321);
        let json = serde_json::to_string(&money).unwrap();
        let deserialized: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(money, deserialized);
    }
}
