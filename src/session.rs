use std::path::Path;

use tracing::debug;

use crate::connection::{Connection, ConnectionFactory};
use crate::error::{DbError, DbResult};
use crate::parameter::ParameterSet;
use crate::resource::{self, ResourceRegistry};
use crate::sqlite::SqliteFactory;
use crate::value::{FromValue, Value};
use crate::value_set::ValueSets;

/// Entry point for callers: a lazily opened connection plus SQL sources.
///
/// The connection is created through the factory on the first statement and
/// reused until [`Session::close_connection`] or drop. A session that never
/// ran a statement never creates, and so never closes, a connection.
pub struct Session {
    factory: Box<dyn ConnectionFactory>,
    connection_string: String,
    connection: Option<Box<dyn Connection>>,
    resources: ResourceRegistry,
}

impl Session {
    pub fn new(
        factory: impl ConnectionFactory + 'static,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            connection_string: connection_string.into(),
            connection: None,
            resources: ResourceRegistry::new(),
        }
    }

    /// Session over the bundled SQLite provider.
    pub fn sqlite(connection_string: impl Into<String>) -> Self {
        Self::new(SqliteFactory::new(), connection_string)
    }

    pub fn with_resources(mut self, resources: ResourceRegistry) -> Self {
        self.resources = resources;
        self
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.resources
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Whether a connection has been created and not closed since.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn execute(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()> {
        self.connection()?.execute(sql, parameters)
    }

    pub fn execute_batch(&mut self, sql: &str, parameter_sets: &[ParameterSet]) -> DbResult<()> {
        self.connection()?.execute_batch(sql, parameter_sets)
    }

    pub fn execute_on_transaction(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<()> {
        self.connection()?.execute_on_transaction(sql, parameters)
    }

    pub fn execute_batch_on_transaction(
        &mut self,
        sql: &str,
        parameter_sets: &[ParameterSet],
    ) -> DbResult<()> {
        self.connection()?
            .execute_batch_on_transaction(sql, parameter_sets)
    }

    pub fn execute_script(&mut self, sql: &str) -> DbResult<()> {
        self.connection()?.execute_script(sql)
    }

    pub fn select(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<ValueSets> {
        self.connection()?.select(sql, parameters)
    }

    /// First column of the first row; `None` when nothing matched.
    pub fn get_scalar(&mut self, sql: &str, parameters: &ParameterSet) -> DbResult<Option<Value>> {
        self.connection()?.get_scalar(sql, parameters)
    }

    /// [`Session::get_scalar`] converted to `T`. No row reads as NULL, so
    /// ask for `Option<T>` when the query may come back empty.
    pub fn get_scalar_as<T: FromValue>(
        &mut self,
        sql: &str,
        parameters: &ParameterSet,
    ) -> DbResult<T> {
        let value = self.get_scalar(sql, parameters)?.unwrap_or(Value::Null);
        T::from_value(value)
    }

    pub fn commit(&mut self) -> DbResult<()> {
        match self.connection.as_mut() {
            Some(connection) => connection.commit(),
            None => Err(DbError::no_transaction("commit")),
        }
    }

    pub fn roll_back(&mut self) -> DbResult<()> {
        match self.connection.as_mut() {
            Some(connection) => connection.roll_back(),
            None => Err(DbError::no_transaction("roll back")),
        }
    }

    /// Close the connection if one is open; a no-op otherwise.
    pub fn close_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            debug!("session connection closed");
        }
    }

    pub fn read_embedded(&self, id: &str) -> DbResult<String> {
        self.resources.read_embedded(id)
    }

    pub fn read_resource(&self, bundle: &str, key: &str) -> DbResult<String> {
        self.resources.read_resource(bundle, key)
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> DbResult<String> {
        resource::read_file(path)
    }

    fn connection(&mut self) -> DbResult<&mut Box<dyn Connection>> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let connection = self.factory.create(&self.connection_string)?;
                debug!("session connection created");
                connection
            }
        };
        Ok(self.connection.insert(connection))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close_connection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{MockConnection, MockConnectionFactory};
    use crate::value_set::ValueSet;

    fn factory_for(connection: MockConnection, creates: usize) -> MockConnectionFactory {
        let mut factory = MockConnectionFactory::new();
        factory
            .expect_create()
            .withf(|connection_string| connection_string == "A")
            .times(creates)
            .return_once(move |_| Ok(Box::new(connection) as Box<dyn Connection>));
        factory
    }

    fn closing_connection() -> MockConnection {
        let mut connection = MockConnection::new();
        connection.expect_close().times(1).return_const(());
        connection
    }

    #[test]
    fn creates_connection_on_first_use() {
        let mut connection = closing_connection();
        connection.expect_execute().times(2).returning(|_, _| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        assert!(!session.is_open());
        session.execute("A", &ParameterSet::new()).unwrap();
        session.execute("A", &ParameterSet::new()).unwrap();
        assert!(session.is_open());
    }

    #[test]
    fn delegates_execute() {
        let mut connection = closing_connection();
        connection
            .expect_execute()
            .withf(|sql, parameters| sql == "A" && parameters.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session.execute("A", &ParameterSet::new()).unwrap();
    }

    #[test]
    fn delegates_execute_batch() {
        let mut connection = closing_connection();
        connection
            .expect_execute_batch()
            .withf(|sql, sets| sql == "A" && sets.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session.execute_batch("A", &[ParameterSet::new()]).unwrap();
    }

    #[test]
    fn delegates_execute_on_transaction() {
        let mut connection = closing_connection();
        connection
            .expect_execute_on_transaction()
            .withf(|sql, parameters| sql == "A" && parameters.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        connection.expect_commit().times(1).returning(|| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session
            .execute_on_transaction("A", &ParameterSet::new().with("Value", 7))
            .unwrap();
        session.commit().unwrap();
    }

    #[test]
    fn delegates_execute_batch_on_transaction() {
        let mut connection = closing_connection();
        connection
            .expect_execute_batch_on_transaction()
            .withf(|sql, sets| sql == "A" && sets.len() == 2)
            .times(1)
            .returning(|_, _| Ok(()));
        connection.expect_roll_back().times(1).returning(|| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session
            .execute_batch_on_transaction("A", &[ParameterSet::new(), ParameterSet::new()])
            .unwrap();
        session.roll_back().unwrap();
    }

    #[test]
    fn delegates_select() {
        let row = ValueSet::from_pairs([("Id", Value::Integer(1))]);
        let expected = vec![row.clone()];
        let mut connection = closing_connection();
        connection
            .expect_select()
            .withf(|sql, _| sql == "A")
            .return_once(move |_, _| Ok(ValueSets::new(vec![row])));

        let mut session = Session::new(factory_for(connection, 1), "A");
        let rows: Vec<_> = session.select("A", &ParameterSet::new()).unwrap().collect();

        assert_eq!(rows, expected);
    }

    #[test]
    fn delegates_get_scalar() {
        let mut connection = closing_connection();
        connection
            .expect_get_scalar()
            .withf(|sql, _| sql == "A")
            .returning(|_, _| Ok(Some(Value::Integer(5))));

        let mut session = Session::new(factory_for(connection, 1), "A");

        assert_eq!(
            session.get_scalar("A", &ParameterSet::new()).unwrap(),
            Some(Value::Integer(5))
        );
        assert_eq!(session.get_scalar_as::<i32>("A", &ParameterSet::new()).unwrap(), 5);
    }

    #[test]
    fn typed_scalar_conversion_errors() {
        let mut connection = closing_connection();
        connection
            .expect_get_scalar()
            .returning(|_, _| Ok(Some(Value::Text("five".into()))));

        let mut session = Session::new(factory_for(connection, 1), "A");
        let err = session
            .get_scalar_as::<i64>("A", &ParameterSet::new())
            .unwrap_err();

        assert!(matches!(err, DbError::Conversion { .. }));
    }

    #[test]
    fn typed_scalar_of_missing_row() {
        let mut connection = closing_connection();
        connection.expect_get_scalar().returning(|_, _| Ok(None));

        let mut session = Session::new(factory_for(connection, 1), "A");

        assert_eq!(
            session
                .get_scalar_as::<Option<i64>>("A", &ParameterSet::new())
                .unwrap(),
            None
        );
    }

    #[test]
    fn close_unused_connection_is_noop() {
        let mut connection = MockConnection::new();
        connection.expect_close().never();

        let mut session = Session::new(factory_for(connection, 0), "A");
        session.close_connection();
        assert!(!session.is_open());
    }

    #[test]
    fn closes_used_connection_once() {
        let mut connection = closing_connection();
        connection
            .expect_execute()
            .withf(|sql, _| sql == "A")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session.execute("A", &ParameterSet::new()).unwrap();
        session.close_connection();
        session.close_connection();

        assert!(!session.is_open());
    }

    #[test]
    fn drop_closes_used_connection() {
        let mut connection = closing_connection();
        connection.expect_execute().returning(|_, _| Ok(()));

        let mut session = Session::new(factory_for(connection, 1), "A");
        session.execute("A", &ParameterSet::new()).unwrap();
        drop(session);
    }

    #[test]
    fn drop_skips_unused_connection() {
        let mut connection = MockConnection::new();
        connection.expect_close().never();

        let session = Session::new(factory_for(connection, 0), "A");
        drop(session);
    }

    #[test]
    fn reopens_after_close() {
        let mut first = closing_connection();
        first.expect_execute().returning(|_, _| Ok(()));
        let mut second = closing_connection();
        second.expect_execute().returning(|_, _| Ok(()));

        let mut factory = MockConnectionFactory::new();
        let mut connections = vec![second, first];
        factory
            .expect_create()
            .times(2)
            .returning(move |_| {
                let connection = connections.pop().expect("two connections");
                Ok(Box::new(connection) as Box<dyn Connection>)
            });

        let mut session = Session::new(factory, "A");
        session.execute("A", &ParameterSet::new()).unwrap();
        session.close_connection();
        session.execute("A", &ParameterSet::new()).unwrap();
    }

    #[test]
    fn commit_on_unopened_session_is_state_error() {
        let factory = factory_for(MockConnection::new(), 0);
        let mut session = Session::new(factory, "A");

        assert!(matches!(
            session.commit(),
            Err(DbError::NoTransaction { operation: "commit" })
        ));
        assert!(matches!(
            session.roll_back(),
            Err(DbError::NoTransaction { operation: "roll back" })
        ));
        assert!(!session.is_open());
    }

    #[test]
    fn factory_failure_leaves_session_unopened() {
        let mut factory = MockConnectionFactory::new();
        factory
            .expect_create()
            .returning(|_| Err(DbError::InvalidConnectionString("bad".into())));

        let mut session = Session::new(factory, "A");
        let err = session.execute("A", &ParameterSet::new()).unwrap_err();

        assert!(matches!(err, DbError::InvalidConnectionString(_)));
        assert!(!session.is_open());
    }

    #[test]
    fn resources_are_resolved_through_session() {
        let mut resources = ResourceRegistry::new();
        resources.register_script("App.Sql.TestScript.sql", "SELECT 1;");
        let session =
            Session::new(factory_for(MockConnection::new(), 0), "A").with_resources(resources);

        assert_eq!(session.read_embedded("App.Sql.TestScript.sql").unwrap(), "SELECT 1;");
        assert_eq!(
            session
                .read_embedded("App.Sql.Nothing.sql")
                .unwrap_err()
                .to_string(),
            "Resource script 'App.Sql.Nothing.sql' couldn't be found."
        );
        assert!(matches!(
            session.read_file("C:\\NotInHere.ttt"),
            Err(DbError::FileNotFound(_))
        ));
    }
}
