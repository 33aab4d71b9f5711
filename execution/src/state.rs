use betchain_types::execution::{genesis_parent, Account, Key, Value};
use bytes::{Buf, BufMut};
use commonware_codec::{Encode, EncodeSize, Error, Read, ReadExt, Write};
use commonware_cryptography::{
    ed25519::PublicKey,
    sha256::{Digest, Sha256},
    Hasher,
};
use commonware_runtime::{Clock, Metrics, Spawner, Storage};
use commonware_storage::{adb::any::variable::Any, translator::Translator};
use std::{collections::HashMap, future::Future};
use tracing::warn;

pub type Adb<E, T> = Any<E, Digest, Value, Sha256, T>;

pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Option<Value>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = ()>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = ()>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = ()> {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await,
                    Status::Delete => self.delete(&key).await,
                }
            }
        }
    }
}

impl<E: Spawner + Metrics + Clock + Storage, T: Translator> State for Adb<E, T> {
    async fn get(&self, key: &Key) -> Option<Value> {
        let key = Sha256::hash(&key.encode());
        match self.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Database error during get operation: {:?}", e);
                None
            }
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        let key = Sha256::hash(&key.encode());
        if let Err(e) = self.update(key, value).await {
            warn!("Database error during insert operation: {:?}", e);
        }
    }

    async fn delete(&mut self, key: &Key) {
        let key = Sha256::hash(&key.encode());
        if let Err(e) = self.delete(key).await {
            warn!("Database error during delete operation: {:?}", e);
        }
    }
}

/// In-memory state, used by the simulator and in tests.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Option<Value> {
        self.state.get(key).cloned()
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.state.insert(key, value);
    }

    async fn delete(&mut self, key: &Key) {
        self.state.remove(key);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

impl Write for Status {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Status::Update(value) => {
                0u8.write(writer);
                value.write(writer);
            }
            Status::Delete => 1u8.write(writer),
        }
    }
}

impl Read for Status {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Status::Update(Value::read(reader)?)),
            1 => Ok(Status::Delete),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Status {
    fn encode_size(&self) -> usize {
        1 + match self {
            Status::Update(value) => value.encode_size(),
            Status::Delete => 0,
        }
    }
}

/// Prior value of every key a block touched.
///
/// Applying [Undo::changes] to the state that resulted from the block
/// restores the state exactly as it was before the block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Undo {
    pub height: u64,
    previous: Vec<(Key, Option<Value>)>,
}

impl Undo {
    pub fn new(height: u64, previous: Vec<(Key, Option<Value>)>) -> Self {
        Self { height, previous }
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    pub fn changes(self) -> Vec<(Key, Status)> {
        self.previous
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => (key, Status::Update(value)),
                None => (key, Status::Delete),
            })
            .collect()
    }
}

pub async fn nonce<S: State>(state: &S, public: &PublicKey) -> u64 {
    load_account(state, public).await.nonce
}

pub async fn balance<S: State>(state: &S, public: &PublicKey) -> u64 {
    load_account(state, public).await.balance
}

/// Digest of the last block applied to `state` (the genesis parent before
/// block 1).
pub async fn tip<S: State>(state: &S) -> Digest {
    match state.get(&Key::Tip).await {
        Some(Value::Tip(digest)) => digest,
        _ => genesis_parent(),
    }
}

pub(crate) async fn load_account<S: State>(state: &S, public: &PublicKey) -> Account {
    match state.get(&Key::Account(public.clone())).await {
        Some(Value::Account(account)) => account,
        _ => Account::default(),
    }
}

/// Credit an account outside of block execution (genesis allocations).
pub async fn fund<S: State>(state: &mut S, public: &PublicKey, amount: u64) {
    let mut account = load_account(state, public).await;
    account.balance = account.balance.saturating_add(amount);
    state
        .insert(Key::Account(public.clone()), Value::Account(account))
        .await;
}
