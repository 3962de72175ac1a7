use rust_decimal::Decimal;
use tokio::sync::RwLock;

use common::{Error, Result};

/// The emulator's cash balance. Withdrawals and deposits are serialized
/// through the lock; reads share it.
pub struct CashAccount {
    balance: RwLock<Decimal>,
}

impl CashAccount {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance: RwLock::new(balance),
        }
    }

    pub async fn balance(&self) -> Decimal {
        *self.balance.read().await
    }

    pub async fn deposit(&self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidArgument(
                "deposit amount cannot be negative".into(),
            ));
        }

        let mut balance = self.balance.write().await;
        *balance += amount;
        Ok(())
    }

    pub async fn withdraw(&self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidArgument(
                "withdraw amount cannot be negative".into(),
            ));
        }

        let mut balance = self.balance.write().await;
        if amount > *balance {
            return Err(Error::VenueRejected("not enough funds".into()));
        }
        *balance -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn deposit_adds_funds() {
        let acc = CashAccount::new(dec!(100));
        acc.deposit(dec!(200)).await.unwrap();
        assert_eq!(acc.balance().await, dec!(300));
    }

    #[tokio::test]
    async fn deposit_rejects_negative() {
        let acc = CashAccount::new(dec!(0));
        assert!(matches!(
            acc.deposit(dec!(-1)).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn withdraw_takes_funds() {
        let acc = CashAccount::new(dec!(1000));
        acc.withdraw(dec!(100)).await.unwrap();
        assert_eq!(acc.balance().await, dec!(900));
    }

    #[tokio::test]
    async fn withdraw_rejects_overdraft() {
        let acc = CashAccount::new(dec!(1));
        assert!(matches!(
            acc.withdraw(dec!(100)).await,
            Err(Error::VenueRejected(_))
        ));
        assert_eq!(acc.balance().await, dec!(1));
    }

    #[tokio::test]
    async fn withdraw_rejects_negative() {
        let acc = CashAccount::new(dec!(1000));
        assert!(acc.withdraw(dec!(-100)).await.is_err());
    }
}
