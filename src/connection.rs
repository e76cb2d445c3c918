//! Driver-facing seam: one trait for a live connection, one for creating it.

#[cfg(test)]
use mockall::automock;

use crate::error::DbResult;
use crate::parameter::ParameterSet;
use crate::value::Value;
use crate::value_set::ValueSets;

/// A single native driver connection with at most one open transaction.
///
/// Every call blocks until the driver is done. Implementations are not
/// expected to be shared between threads without external locking.
#[cfg_attr(test, automock)]
pub trait Connection {
    /// Run a query and return its rows in driver order.
    ///
    /// Rows are read in full before this returns and held in memory; the
    /// returned sequence is forward-only.
    fn select(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<ValueSets>;

    /// Run a statement and apply it immediately.
    fn execute(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()>;

    /// Run the same statement once per parameter set, in order.
    ///
    /// There is no atomicity across the batch: statements that ran before a
    /// failing one stay applied.
    fn execute_batch(&mut self, sql: &str, parameter_sets: &[ParameterSet]) -> DbResult<()>;

    /// Run a statement inside the open transaction, beginning one if needed.
    fn execute_on_transaction(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()>;

    /// Batch variant of [`Connection::execute_on_transaction`].
    fn execute_batch_on_transaction(
        &mut self,
        sql: &str,
        parameter_sets: &[ParameterSet],
    ) -> DbResult<()>;

    /// Run a multi-statement script without parameters.
    fn execute_script(&mut self, sql: &str) -> DbResult<()>;

    /// First column of the first row, `None` when the query yields no row.
    fn get_scalar(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<Option<Value>>;

    fn commit(&mut self) -> DbResult<()>;

    fn roll_back(&mut self) -> DbResult<()>;

    /// Release the native handle. Idempotent and never fails.
    fn close(&mut self);
}

/// Creates connections for one driver from a connection string.
///
/// Must not touch the database; opening is left to the first statement.
#[cfg_attr(test, automock)]
pub trait ConnectionFactory {
    fn create(&self, connection_string: &str) -> DbResult<Box<dyn Connection>>;
}
