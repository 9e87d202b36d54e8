//! Scripted in-memory warehouse shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bidboard::error::Result;
use bidboard::{
    BidboardError, BoundQuery, ColumnMeta, ConnectionFactory, TabularResult, WarehouseConnection,
    WarehouseKind,
};
use serde_json::Value;

type Responder = dyn Fn(&BoundQuery) -> Result<TabularResult> + Send + Sync;

#[derive(Default)]
pub struct CallLog {
    pub queries: Mutex<Vec<BoundQuery>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl CallLog {
    pub fn sql(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.sql.clone())
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory {
    kind: WarehouseKind,
    available: bool,
    responder: Arc<Responder>,
    pub log: Arc<CallLog>,
}

impl FakeFactory {
    pub fn new<F>(kind: WarehouseKind, responder: F) -> Self
    where
        F: Fn(&BoundQuery) -> Result<TabularResult> + Send + Sync + 'static,
    {
        Self {
            kind,
            available: true,
            responder: Arc::new(responder),
            log: Arc::new(CallLog::default()),
        }
    }

    /// Every statement returns the same table.
    pub fn returning(table: TabularResult) -> Self {
        Self::new(WarehouseKind::Databricks, move |_| Ok(table.clone()))
    }

    /// Every statement fails during execution.
    pub fn failing(message: &'static str) -> Self {
        Self::new(WarehouseKind::Databricks, move |_| {
            Err(BidboardError::Execution(message.to_string()))
        })
    }

    /// Credentials are missing, so no connection is ever opened.
    pub fn unavailable() -> Self {
        let mut factory = Self::returning(TabularResult::empty());
        factory.available = false;
        factory
    }
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    fn kind(&self) -> WarehouseKind {
        self.kind
    }

    async fn connect(&self) -> Result<Option<Box<dyn WarehouseConnection>>> {
        if !self.available {
            return Ok(None);
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Box::new(FakeConnection {
            responder: self.responder.clone(),
            log: self.log.clone(),
        })))
    }
}

struct FakeConnection {
    responder: Arc<Responder>,
    log: Arc<CallLog>,
}

#[async_trait]
impl WarehouseConnection for FakeConnection {
    async fn execute(&self, query: &BoundQuery) -> Result<TabularResult> {
        self.log.queries.lock().unwrap().push(query.clone());
        (self.responder)(query)
    }

    async fn close(&self) -> Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> TabularResult {
    TabularResult::new(columns.iter().map(|c| ColumnMeta::new(*c)).collect(), rows).unwrap()
}
