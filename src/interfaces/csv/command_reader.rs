use crate::domain::account::{AccountId, CreateAccountParams};
use crate::domain::transfer::TransferTxParams;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Transfer,
}

/// One raw CSV row: `type, from, to, amount, owner, currency`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub r#type: CommandType,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Option<i64>,
    pub owner: Option<String>,
    pub currency: Option<String>,
}

/// A row turned into the operation it requests.
#[derive(Debug, PartialEq, Clone)]
pub enum LedgerCommand {
    Open(CreateAccountParams),
    Transfer {
        params: TransferTxParams,
        currency: Option<String>,
    },
}

impl TryFrom<CommandRecord> for LedgerCommand {
    type Error = LedgerError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        match record.r#type {
            CommandType::Open => Ok(LedgerCommand::Open(CreateAccountParams {
                owner: required(record.owner, "owner")?,
                currency: required(record.currency, "currency")?,
                balance: record.amount.unwrap_or(0),
            })),
            CommandType::Transfer => Ok(LedgerCommand::Transfer {
                params: TransferTxParams {
                    from_account_id: required(record.from, "from")?,
                    to_account_id: required(record.to, "to")?,
                    amount: required(record.amount, "amount")?,
                },
                currency: record.currency,
            }),
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| LedgerError::ValidationError(format!("Missing field `{}`", field)))
}

/// Reads ledger commands from a CSV source.
///
/// Whitespace is trimmed and short records are accepted; each row is parsed
/// lazily so large inputs are streamed.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<LedgerCommand>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(LedgerError::from).and_then(LedgerCommand::try_from))
    }
}
