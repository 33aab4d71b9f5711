use crate::games::{Bet, BetRequest, GameFamily};
use bytes::{Buf, BufMut};
use commonware_codec::{
    varint::UInt, Encode, EncodeSize, Error, FixedSize, RangeCfg, Read, ReadExt, Write,
};
use commonware_cryptography::{
    ed25519::{self, PublicKey},
    sha256::{Digest, Sha256},
    Digestible, Hasher, Signer, Verifier,
};
use commonware_utils::union;

pub const NAMESPACE: &[u8] = b"_BETCHAIN";
pub const TRANSACTION_SUFFIX: &[u8] = b"_TX";
pub const GENESIS_SUFFIX: &[u8] = b"_GENESIS";
pub const MAX_BLOCK_TRANSACTIONS: usize = 500;
pub const MAX_BLOCK_SETTLEMENTS: usize = 10_000;
pub const MAX_DUE_BETS: usize = MAX_BLOCK_TRANSACTIONS;

#[inline]
pub fn transaction_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, TRANSACTION_SUFFIX)
}

/// Parent digest of the genesis block.
pub fn genesis_parent() -> Digest {
    Sha256::hash(&union(NAMESPACE, GENESIS_SUFFIX))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub instruction: Instruction,

    pub public: ed25519::PublicKey,
    pub signature: ed25519::Signature,
}

impl Transaction {
    fn payload(nonce: &u64, instruction: &Instruction) -> Vec<u8> {
        let mut payload = Vec::new();
        nonce.write(&mut payload);
        instruction.write(&mut payload);

        payload
    }

    pub fn sign(private: &ed25519::PrivateKey, nonce: u64, instruction: Instruction) -> Self {
        let signature = private.sign(
            Some(&transaction_namespace(NAMESPACE)),
            &Self::payload(&nonce, &instruction),
        );

        Self {
            nonce,
            instruction,
            public: private.public_key(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.public.verify(
            Some(&transaction_namespace(NAMESPACE)),
            &Self::payload(&self.nonce, &self.instruction),
            &self.signature,
        )
    }
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.nonce.write(writer);
        self.instruction.write(writer);
        self.public.write(writer);
        self.signature.write(writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let nonce = u64::read(reader)?;
        let instruction = Instruction::read(reader)?;
        let public = ed25519::PublicKey::read(reader)?;
        let signature = ed25519::Signature::read(reader)?;

        Ok(Self {
            nonce,
            instruction,
            public,
            signature,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        self.nonce.encode_size()
            + self.instruction.encode_size()
            + self.public.encode_size()
            + self.signature.encode_size()
    }
}

impl Digestible for Transaction {
    type Digest = Digest;

    fn digest(&self) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(self.nonce.to_be_bytes().as_ref());
        hasher.update(self.instruction.encode().as_ref());
        hasher.update(self.public.as_ref());
        // The signature is excluded: any valid signature authorizes the same
        // placement, so the bet id must not depend on it.
        hasher.finalize()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Place a bet. The stake is debited when the placement is included.
    /// Binary: [0] [request...]
    PlaceBet(BetRequest),
}

impl Instruction {
    pub fn bet(&self) -> &BetRequest {
        match self {
            Instruction::PlaceBet(request) => request,
        }
    }
}

impl Write for Instruction {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::PlaceBet(request) => {
                0u8.write(writer);
                request.write(writer);
            }
        }
    }
}

impl Read for Instruction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let instruction = match u8::read(reader)? {
            0 => Self::PlaceBet(BetRequest::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(instruction)
    }
}

impl EncodeSize for Instruction {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::PlaceBet(request) => request.encode_size(),
            }
    }
}

/// Credit emitted by the engine for a winning bet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub bet: Digest,
    pub owner: PublicKey,
    pub payout: u64,
}

impl Write for Settlement {
    fn write(&self, writer: &mut impl BufMut) {
        self.bet.write(writer);
        self.owner.write(writer);
        self.payout.write(writer);
    }
}

impl Read for Settlement {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            bet: Digest::read(reader)?,
            owner: PublicKey::read(reader)?,
            payout: u64::read(reader)?,
        })
    }
}

impl FixedSize for Settlement {
    const SIZE: usize = Digest::SIZE + PublicKey::SIZE + u64::SIZE;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub parent: Digest,
    pub height: u64,

    /// Recipient of the block subsidy.
    pub miner: PublicKey,
    pub subsidy: u64,

    pub placements: Vec<Transaction>,
    pub settlements: Vec<Settlement>,

    digest: Digest,
}

impl Block {
    fn compute_digest(
        parent: &Digest,
        height: u64,
        miner: &PublicKey,
        subsidy: u64,
        placements: &[Transaction],
        settlements: &[Settlement],
    ) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(parent);
        hasher.update(&height.to_be_bytes());
        hasher.update(miner.as_ref());
        hasher.update(&subsidy.to_be_bytes());
        for placement in placements {
            hasher.update(&placement.digest());
        }
        for settlement in settlements {
            hasher.update(&settlement.encode());
        }
        hasher.finalize()
    }

    pub fn new(
        parent: Digest,
        height: u64,
        miner: PublicKey,
        subsidy: u64,
        placements: Vec<Transaction>,
        settlements: Vec<Settlement>,
    ) -> Self {
        assert!(placements.len() <= MAX_BLOCK_TRANSACTIONS);
        assert!(settlements.len() <= MAX_BLOCK_SETTLEMENTS);
        let digest = Self::compute_digest(
            &parent,
            height,
            &miner,
            subsidy,
            &placements,
            &settlements,
        );
        Self {
            parent,
            height,
            miner,
            subsidy,
            placements,
            settlements,
            digest,
        }
    }
}

impl Write for Block {
    fn write(&self, writer: &mut impl BufMut) {
        self.parent.write(writer);
        UInt(self.height).write(writer);
        self.miner.write(writer);
        UInt(self.subsidy).write(writer);
        self.placements.write(writer);
        self.settlements.write(writer);
    }
}

impl Read for Block {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let parent = Digest::read(reader)?;
        let height = UInt::read(reader)?.into();
        let miner = PublicKey::read(reader)?;
        let subsidy = UInt::read(reader)?.into();
        let placements = Vec::<Transaction>::read_cfg(
            reader,
            &(RangeCfg::from(0..=MAX_BLOCK_TRANSACTIONS), ()),
        )?;
        let settlements = Vec::<Settlement>::read_cfg(
            reader,
            &(RangeCfg::from(0..=MAX_BLOCK_SETTLEMENTS), ()),
        )?;

        // Pre-compute the digest
        let digest = Self::compute_digest(
            &parent,
            height,
            &miner,
            subsidy,
            &placements,
            &settlements,
        );
        Ok(Self {
            parent,
            height,
            miner,
            subsidy,
            placements,
            settlements,
            digest,
        })
    }
}

impl EncodeSize for Block {
    fn encode_size(&self) -> usize {
        self.parent.encode_size()
            + UInt(self.height).encode_size()
            + self.miner.encode_size()
            + UInt(self.subsidy).encode_size()
            + self.placements.encode_size()
            + self.settlements.encode_size()
    }
}

impl Digestible for Block {
    type Digest = Digest;

    fn digest(&self) -> Digest {
        self.digest
    }
}

/// Balance and replay protection for an account.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct Account {
    pub nonce: u64,
    pub balance: u64,
}

impl Write for Account {
    fn write(&self, writer: &mut impl BufMut) {
        self.nonce.write(writer);
        self.balance.write(writer);
    }
}

impl Read for Account {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            nonce: u64::read(reader)?,
            balance: u64::read(reader)?,
        })
    }
}

impl EncodeSize for Account {
    fn encode_size(&self) -> usize {
        self.nonce.encode_size() + self.balance.encode_size()
    }
}

/// Aggregates kept alongside the pending bets.
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug)]
pub struct LedgerTotals {
    /// Sum of `max_payout` over every pending bet.
    pub total_potential_liability: u64,
    pub pending: u64,
}

impl Write for LedgerTotals {
    fn write(&self, writer: &mut impl BufMut) {
        self.total_potential_liability.write(writer);
        self.pending.write(writer);
    }
}

impl Read for LedgerTotals {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self {
            total_potential_liability: u64::read(reader)?,
            pending: u64::read(reader)?,
        })
    }
}

impl FixedSize for LedgerTotals {
    const SIZE: usize = u64::SIZE + u64::SIZE;
}

#[derive(Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Debug)]
pub enum Key {
    /// Account balance and nonce (tag 0)
    Account(PublicKey),
    /// Digest of the last committed block (tag 1)
    Tip,

    // Pending ledger keys (tags 10-12)
    Bet(Digest),
    Due(u64),
    Ledger,
}

impl Write for Key {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(pk) => {
                0u8.write(writer);
                pk.write(writer);
            }
            Self::Tip => 1u8.write(writer),
            Self::Bet(id) => {
                10u8.write(writer);
                id.write(writer);
            }
            Self::Due(height) => {
                11u8.write(writer);
                height.write(writer);
            }
            Self::Ledger => 12u8.write(writer),
        }
    }
}

impl Read for Key {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let key = match u8::read(reader)? {
            0 => Self::Account(PublicKey::read(reader)?),
            1 => Self::Tip,
            10 => Self::Bet(Digest::read(reader)?),
            11 => Self::Due(u64::read(reader)?),
            12 => Self::Ledger,
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(key)
    }
}

impl EncodeSize for Key {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(_) => PublicKey::SIZE,
                Self::Tip => 0,
                Self::Bet(_) => Digest::SIZE,
                Self::Due(_) => u64::SIZE,
                Self::Ledger => 0,
            }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Account(Account),
    Tip(Digest),

    // System values
    Commit {
        height: u64,
        start: u64,
    },

    // Pending ledger values (tags 10-12)
    Bet(Bet),
    /// Bets placed at a height, in placement order.
    Due(Vec<Digest>),
    Ledger(LedgerTotals),
}

impl Write for Value {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Self::Account(account) => {
                0u8.write(writer);
                account.write(writer);
            }
            Self::Tip(digest) => {
                1u8.write(writer);
                digest.write(writer);
            }
            Self::Commit { height, start } => {
                3u8.write(writer);
                height.write(writer);
                start.write(writer);
            }
            Self::Bet(bet) => {
                10u8.write(writer);
                bet.write(writer);
            }
            Self::Due(ids) => {
                11u8.write(writer);
                ids.write(writer);
            }
            Self::Ledger(totals) => {
                12u8.write(writer);
                totals.write(writer);
            }
        }
    }
}

impl Read for Value {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = match u8::read(reader)? {
            0 => Self::Account(Account::read(reader)?),
            1 => Self::Tip(Digest::read(reader)?),
            3 => Self::Commit {
                height: u64::read(reader)?,
                start: u64::read(reader)?,
            },
            10 => Self::Bet(Bet::read(reader)?),
            11 => Self::Due(Vec::<Digest>::read_cfg(
                reader,
                &(RangeCfg::from(0..=MAX_DUE_BETS), ()),
            )?),
            12 => Self::Ledger(LedgerTotals::read(reader)?),
            i => return Err(Error::InvalidEnum(i)),
        };

        Ok(value)
    }
}

impl EncodeSize for Value {
    fn encode_size(&self) -> usize {
        u8::SIZE
            + match self {
                Self::Account(account) => account.encode_size(),
                Self::Tip(_) => Digest::SIZE,
                Self::Commit { height, start } => height.encode_size() + start.encode_size(),
                Self::Bet(bet) => bet.encode_size(),
                Self::Due(ids) => ids.encode_size(),
                Self::Ledger(totals) => totals.encode_size(),
            }
    }
}

/// Observable effects of executing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Subsidy {
        miner: PublicKey,
        amount: u64,
    },
    BetPlaced {
        bet: Digest,
        owner: PublicKey,
        family: GameFamily,
        range: u32,
        stake: u64,
        max_payout: u64,
    },
    Draw {
        height: u64,
        family: GameFamily,
        range: u32,
        value: u32,
    },
    /// Emitted for every resolved bet, including losses (`payout == 0`).
    BetSettled {
        bet: Digest,
        owner: PublicKey,
        payout: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Output {
    Event(Event),
    Transaction(Transaction),
    Settlement(Settlement),
}
