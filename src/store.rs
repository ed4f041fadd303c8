//! Account Store
//!
//! Keyed record storage with create-if-absent semantics. When two operations
//! race for the same derived address, the first `create` wins and the second
//! sees `AccountAlreadyInUse`. There is no other locking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;
use crate::error::MarketError;
use crate::state::AccountRecord;

/// Raw account: owning program plus discriminator-tagged bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub owner: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountStore {
    accounts: BTreeMap<Address, StoredAccount>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Allocate a new account. Fails if anything already lives at `address`.
    pub fn create<T: AccountRecord>(&mut self, address: Address, owner: Address, record: &T) -> Result<(), MarketError> {
        if self.accounts.contains_key(&address) {
            return Err(MarketError::AccountAlreadyInUse(address));
        }
        let data = record.encode()?;
        self.accounts.insert(address, StoredAccount { owner, data });
        Ok(())
    }

    pub fn load<T: AccountRecord>(&self, address: &Address) -> Result<T, MarketError> {
        let account = self
            .accounts
            .get(address)
            .ok_or(MarketError::AccountNotFound(*address))?;
        T::decode(&account.data).unwrap_or(Err(MarketError::AccountDiscriminatorMismatch(*address)))
    }

    /// Overwrite an existing account of the same type
    pub fn store<T: AccountRecord>(&mut self, address: &Address, record: &T) -> Result<(), MarketError> {
        self.load::<T>(address)?;
        let data = record.encode()?;
        if let Some(account) = self.accounts.get_mut(address) {
            account.data = data;
        }
        Ok(())
    }

    /// Reclaim an account, returning its last state
    pub fn close<T: AccountRecord>(&mut self, address: &Address) -> Result<T, MarketError> {
        let record = self.load::<T>(address)?;
        self.accounts.remove(address);
        Ok(record)
    }

    /// Every record of type `T`, in address order
    pub fn iter<T: AccountRecord>(&self) -> impl Iterator<Item = (Address, T)> + '_ {
        self.accounts
            .iter()
            .filter_map(|(address, account)| match T::decode(&account.data) {
                Some(Ok(record)) => Some((*address, record)),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Bet, Direction, Pool};

    const OWNER: Address = Address::new([0xaa; 32]);

    fn pool(balance: u64) -> Pool {
        Pool { market: Address::new([1u8; 32]), bump: 255, balance }
    }

    #[test]
    fn test_create_if_absent() {
        let mut store = AccountStore::new();
        let address = Address::new([2u8; 32]);

        store.create(address, OWNER, &pool(10)).unwrap();
        assert_eq!(
            store.create(address, OWNER, &pool(20)),
            Err(MarketError::AccountAlreadyInUse(address))
        );
        assert_eq!(store.load::<Pool>(&address).unwrap().balance, 10);
    }

    #[test]
    fn test_typed_load() {
        let mut store = AccountStore::new();
        let address = Address::new([3u8; 32]);
        store.create(address, OWNER, &pool(0)).unwrap();

        assert_eq!(
            store.load::<Bet>(&address),
            Err(MarketError::AccountDiscriminatorMismatch(address))
        );
        assert_eq!(
            store.load::<Pool>(&Address::new([4u8; 32])),
            Err(MarketError::AccountNotFound(Address::new([4u8; 32])))
        );
    }

    #[test]
    fn test_store_and_close() {
        let mut store = AccountStore::new();
        let address = Address::new([5u8; 32]);
        store.create(address, OWNER, &pool(1)).unwrap();

        store.store(&address, &pool(7)).unwrap();
        assert_eq!(store.close::<Pool>(&address).unwrap().balance, 7);
        assert!(!store.contains(&address));
        assert!(store.store(&address, &pool(8)).is_err());
    }

    #[test]
    fn test_iter_filters_by_type() {
        let mut store = AccountStore::new();
        store.create(Address::new([6u8; 32]), OWNER, &pool(1)).unwrap();
        let bet = Bet {
            market: Address::new([1u8; 32]),
            user: Address::new([9u8; 32]),
            amount: 5,
            direction: Direction::Lower,
            bump: 250,
        };
        store.create(Address::new([7u8; 32]), OWNER, &bet).unwrap();

        let bets: Vec<_> = store.iter::<Bet>().collect();
        assert_eq!(bets, vec![(Address::new([7u8; 32]), bet)]);
        assert_eq!(store.iter::<Pool>().count(), 1);
        assert_eq!(store.len(), 2);
    }
}
