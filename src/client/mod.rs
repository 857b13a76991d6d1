//! Client library: create tables and write rows.
//!
//! The client remembers the highest server timestamp it has seen in any
//! response (`latest_observed_timestamp`) and propagates it with every
//! write, so later writes are timestamped after anything it has observed.

pub mod data_gen;
pub mod session;

pub use data_gen::generate_data_for_row;
pub use session::{FlushMode, Session};

use crate::common::clock::Timestamp;
use crate::common::http::RpcClient;
use crate::common::schema::Schema;
use crate::common::utils::{encode_segment, http_url};
use crate::common::wire::{
    CreateTableRequest, CreateTableResponse, PingResponse, ReplicaRole, TableDescriptor,
    TabletDescriptor, TabletServerDescriptor,
};
use crate::common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Client {
    master: String,
    master_url: String,
    rpc: RpcClient,
}

impl Client {
    /// Connect to the master at `master_address`
    pub async fn connect(master_address: &str) -> Result<Self> {
        let client = Self {
            master: master_address.to_string(),
            master_url: http_url(master_address),
            rpc: RpcClient::new(DEFAULT_RPC_TIMEOUT)?,
        };
        let _: PingResponse = client
            .rpc
            .get(&client.master, &format!("{}/ping", client.master_url))
            .await
            .map_err(|e| Error::ConnectionFailed(format!("master {}: {}", master_address, e)))?;
        Ok(client)
    }

    /// Highest server timestamp seen by this client, if any
    pub fn latest_observed_timestamp(&self) -> Option<Timestamp> {
        self.rpc.latest_observed_timestamp()
    }

    pub(crate) fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn table_creator(&self, name: &str) -> TableCreator<'_> {
        TableCreator {
            client: self,
            name: name.to_string(),
            schema: None,
            num_replicas: None,
            split_keys: Vec::new(),
        }
    }

    pub async fn open_table(&self, name: &str) -> Result<ClientTable> {
        let descriptors: Vec<TableDescriptor> = self
            .rpc
            .get(&self.master, &format!("{}/tables", self.master_url))
            .await?;
        let descriptor = descriptors
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::NotFound(format!("table {}", name)))?;
        let tablets = self.list_tablets(name).await?;
        Ok(ClientTable {
            descriptor,
            tablets: Arc::new(tablets),
        })
    }

    pub fn new_session(&self) -> Session {
        Session::new(self.clone())
    }

    pub(crate) async fn list_tablets(&self, table: &str) -> Result<Vec<TabletDescriptor>> {
        let url = format!("{}/tables/{}/tablets", self.master_url, encode_segment(table));
        self.rpc.get(&self.master, &url).await
    }

    /// Address of the current leader of `tablet_id`, as known to the master
    pub(crate) async fn find_leader(&self, table: &str, tablet_id: &str) -> Result<(String, String)> {
        let tablets = self.list_tablets(table).await?;
        let tablet = tablets
            .iter()
            .find(|t| t.tablet_id == tablet_id)
            .ok_or_else(|| Error::NotFound(format!("tablet {}", tablet_id)))?;
        let leader = tablet
            .replicas
            .iter()
            .find(|r| r.role == ReplicaRole::Leader)
            .ok_or_else(|| Error::NotLeader(format!("tablet {} has no leader yet", tablet_id)))?;

        let servers: Vec<TabletServerDescriptor> = self
            .rpc
            .get(&self.master, &format!("{}/tablet-servers", self.master_url))
            .await?;
        let server = servers
            .into_iter()
            .find(|s| s.node_id == leader.node_id)
            .ok_or_else(|| Error::Unavailable {
                node: leader.node_id.clone(),
                reason: "not registered with the master".into(),
            })?;
        Ok((server.node_id, http_url(&server.address)))
    }
}

/// Table creation options
pub struct TableCreator<'a> {
    client: &'a Client,
    name: String,
    schema: Option<Schema>,
    num_replicas: Option<usize>,
    split_keys: Vec<i64>,
}

impl TableCreator<'_> {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn num_replicas(mut self, num_replicas: usize) -> Self {
        self.num_replicas = Some(num_replicas);
        self
    }

    /// Split the key space at these keys; N keys yield N + 1 tablets.
    pub fn split_keys(mut self, split_keys: Vec<i64>) -> Self {
        self.split_keys = split_keys;
        self
    }

    pub async fn create(self) -> Result<CreateTableResponse> {
        let schema = self
            .schema
            .ok_or_else(|| Error::InvalidArgument(format!("table {} needs a schema", self.name)))?;
        let request = CreateTableRequest {
            name: self.name,
            schema,
            num_replicas: self.num_replicas,
            split_keys: self.split_keys,
        };
        let url = format!("{}/tables", self.client.master_url);
        let response: CreateTableResponse = self
            .client
            .rpc
            .post(&self.client.master, &url, &request)
            .await?;
        info!(
            "Created table {} with {} tablet(s)",
            response.table.name,
            response.tablets.len()
        );
        Ok(response)
    }
}

/// An opened table: schema plus tablet key ranges
#[derive(Debug, Clone)]
pub struct ClientTable {
    descriptor: TableDescriptor,
    tablets: Arc<Vec<TabletDescriptor>>,
}

impl ClientTable {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn schema(&self) -> &Schema {
        &self.descriptor.schema
    }

    pub fn tablets(&self) -> &[TabletDescriptor] {
        &self.tablets
    }

    /// Tablet whose key range holds `key`
    pub fn tablet_for_key(&self, key: i64) -> Result<&TabletDescriptor> {
        self.tablets
            .iter()
            .find(|t| t.key_range.contains(key))
            .ok_or_else(|| {
                Error::NotFound(format!("no tablet of {} covers key {}", self.name(), key))
            })
    }
}
