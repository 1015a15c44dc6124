use crate::domain::account::{Account, AccountId};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    id: AccountId,
    owner: &'a str,
    currency: &'a str,
    balance: i64,
}

/// Writes final account balances as `id,owner,currency,balance`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow {
                id: account.id,
                owner: &account.owner,
                currency: &account.currency,
                balance: account.balance,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_write_accounts() {
        let accounts = vec![
            Account {
                id: AccountId(1),
                owner: "alice".to_string(),
                currency: "USD".to_string(),
                balance: 70,
                created_at: Utc::now(),
            },
            Account {
                id: AccountId(2),
                owner: "bob".to_string(),
                currency: "USD".to_string(),
                balance: 80,
                created_at: Utc::now(),
            },
        ];

        let mut out = Vec::new();
        AccountWriter::new(&mut out).write_accounts(accounts).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,owner,currency,balance\n1,alice,USD,70\n2,bob,USD,80\n");
    }

    #[test]
    fn test_write_no_accounts() {
        let mut out = Vec::new();
        AccountWriter::new(&mut out)
            .write_accounts(Vec::new())
            .unwrap();
        assert!(out.is_empty());
    }
}
