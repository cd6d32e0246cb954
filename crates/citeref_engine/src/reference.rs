/* 📖 # How is stored reference data shaped?

A page can hold several reference lists (one per `<references>` tag). Each list
holds named groups, and each group holds its members:

    refs: list index -> group name -> member name or position -> record

The stored JSON uses object keys for all three levels. Member keys are either an
explicit reference name or a position. A member stored under a decimal key or
under the empty string has no explicit name; its id is derived from its `key`
alone.

Flattening walks the three levels in stored order and produces one list per page,
keyed by the derived id, with `group` and `reflist` recording where each record
came from.
*/

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ids::ReferenceKeyEncoder;
use crate::ordered::OrderedMap;

/// Identifier of a page. Pages are always visited in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(u64);

impl PageId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for PageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a member is addressed inside its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefName {
    /// `<ref name="...">`
    Named(String),
    /// Anonymous reference stored under its position.
    Index(u64),
    /// Anonymous reference stored under the empty string.
    Anonymous,
}

impl RefName {
    /// Classify a stored member key.
    pub fn from_member_key(key: &str) -> Self {
        if key.is_empty() {
            return Self::Anonymous;
        }
        match key.parse::<u64>() {
            Ok(index) if index.to_string() == key => Self::Index(index),
            _ => Self::Named(key.to_string()),
        }
    }

    /// The explicit name, if the reference has one.
    pub fn explicit(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Index(_) | Self::Anonymous => None,
        }
    }
}

impl Serialize for RefName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Named(name) => serializer.serialize_str(name),
            Self::Index(index) => serializer.serialize_u64(*index),
            Self::Anonymous => serializer.serialize_str(""),
        }
    }
}

/// One stored reference: its position in the group plus opaque citation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub key: u64,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

/// Members of one group, keyed by stored member key.
pub type GroupMembers = OrderedMap<ReferenceRecord>;

/// Groups of one reference list, keyed by group name ("" is the default group).
pub type ReferenceGrouping = OrderedMap<GroupMembers>;

/// Everything stored for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredReferenceSet {
    #[serde(default)]
    pub refs: BTreeMap<u32, ReferenceGrouping>,
}

impl StoredReferenceSet {
    /// Total number of stored records across all lists and groups.
    pub fn record_count(&self) -> usize {
        self.refs
            .values()
            .flat_map(|grouping| grouping.iter())
            .map(|(_, members)| members.len())
            .sum()
    }
}

/// A record as it appears in the response, enriched with its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedReference {
    pub key: u64,
    pub name: RefName,
    pub group: String,
    pub reflist: u32,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

/// Fields set from the record's position; stored copies are dropped so they
/// cannot shadow the derived values.
const DERIVED_FIELDS: [&str; 5] = ["key", "name", "group", "reflist", "id"];

/// The per-page output: flattened records keyed by derived id, in stored order.
pub type ReferenceList = OrderedMap<FlattenedReference>;

/// Flatten list index -> group -> member into one list keyed by derived id.
///
/// Should two members derive the same id, the later record replaces the earlier
/// one in the earlier one's position.
pub fn flatten_references(
    stored: &StoredReferenceSet,
    encoder: &ReferenceKeyEncoder,
) -> ReferenceList {
    let mut list = ReferenceList::new();
    for (&reflist, grouping) in &stored.refs {
        for (group, members) in grouping.iter() {
            for (member_key, record) in members.iter() {
                let name = RefName::from_member_key(member_key);
                let id = encoder.reference_id(&name, record.key);
                let mut content = record.content.clone();
                for field in DERIVED_FIELDS {
                    content.remove(field);
                }
                list.insert(
                    id,
                    FlattenedReference {
                        key: record.key,
                        name,
                        group: group.to_string(),
                        reflist,
                        content,
                    },
                );
            }
        }
    }
    list
}
