//! Thin helpers over sled: CBOR records, id pointers and the invoice number counter
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::Db;

pub type TxResult<T> = ConflictableTransactionResult<T, anyhow::Error>;

/// Abort the surrounding transaction. The error reaches the caller unchanged.
pub fn abort<T>(err: impl Into<anyhow::Error>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

/// Turn a domain result into a transaction result, aborting on error.
pub fn lift<T, E: Into<anyhow::Error>>(result: Result<T, E>) -> TxResult<T> {
    result.or_else(|err| abort(err))
}

/// Run `f` as one serializable transaction over the default tree. sled reruns the
/// closure on write conflicts, so it must not have side effects outside `tx`.
pub fn transaction<T>(db: &Db, f: impl Fn(&TransactionalTree) -> TxResult<T>) -> anyhow::Result<T> {
    db.transaction(f).map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => err.into(),
    })
}

pub fn get<T>(db: &Db, key: &str) -> anyhow::Result<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match db.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
        None => Ok(None),
    }
}

pub fn get_id(db: &Db, key: &str) -> anyhow::Result<Option<String>> {
    match db.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(String::from_utf8(bytes.to_vec())?)),
        None => Ok(None),
    }
}

pub fn tx_get<T>(tx: &TransactionalTree, key: &str) -> TxResult<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tx.get(key.as_bytes())? {
        Some(bytes) => match minicbor::decode(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => abort(err),
        },
        None => Ok(None),
    }
}

pub fn tx_put<T>(tx: &TransactionalTree, key: &str, value: &T) -> TxResult<()>
where
    T: minicbor::Encode<()>,
{
    let bytes = match minicbor::to_vec(value) {
        Ok(bytes) => bytes,
        Err(err) => return abort(err),
    };
    tx.insert(key.as_bytes(), bytes)?;
    Ok(())
}

pub fn tx_get_id(tx: &TransactionalTree, key: &str) -> TxResult<Option<String>> {
    match tx.get(key.as_bytes())? {
        Some(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(id) => Ok(Some(id)),
            Err(err) => abort(err),
        },
        None => Ok(None),
    }
}

pub fn tx_put_id(tx: &TransactionalTree, key: &str, id: &str) -> TxResult<()> {
    tx.insert(key.as_bytes(), id.as_bytes())?;
    Ok(())
}

pub fn tx_get_u64(tx: &TransactionalTree, key: &str) -> TxResult<u64> {
    match tx.get(key.as_bytes())? {
        Some(bytes) => match <[u8; 8]>::try_from(bytes.as_ref()) {
            Ok(raw) => Ok(u64::from_be_bytes(raw)),
            Err(err) => abort(err),
        },
        None => Ok(0),
    }
}

pub fn tx_put_u64(tx: &TransactionalTree, key: &str, value: u64) -> TxResult<()> {
    tx.insert(key.as_bytes(), &value.to_be_bytes()[..])?;
    Ok(())
}

/// Next value of a counter stored under `key`, starting at 1. Values are never
/// handed out twice because the increment commits with the caller's writes.
pub fn tx_next(tx: &TransactionalTree, key: &str) -> TxResult<u64> {
    let next = tx_get_u64(tx, key)? + 1;
    tx_put_u64(tx, key, next)?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counter_is_monotonic_across_transactions() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = sled::open(temp_dir.path().join("counter.db"))?;

        let a = transaction(&db, |tx| tx_next(tx, "counter/test"))?;
        let b = transaction(&db, |tx| tx_next(tx, "counter/test"))?;

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        Ok(())
    }

    #[test]
    fn abort_rolls_back_writes() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = sled::open(temp_dir.path().join("abort.db"))?;

        let result: anyhow::Result<()> = transaction(&db, |tx| {
            tx_put_id(tx, "pointer", "value")?;
            abort(anyhow::anyhow!("nope"))
        });

        assert!(result.is_err());
        assert_eq!(get_id(&db, "pointer")?, None);
        Ok(())
    }
}
