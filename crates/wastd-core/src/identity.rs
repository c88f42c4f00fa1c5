//! Identity resolution: which encounters concern the same animal?
//!
//! The only linking signal is a shared tag. Starting from one encounter, the
//! closure repeatedly looks up every encounter carrying a newly discovered tag
//! and every tag carried by a newly discovered encounter, until a round adds
//! no new tags. Encounters and tags form an arbitrary bipartite graph (cycles
//! included), so the traversal is iterative and keeps explicit visited sets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observation::{TagType, TagValue};

/// The identity of a physical tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
  pub tag_type: TagType,
  pub name:     String,
}

impl TagKey {
  pub fn new(tag_type: TagType, name: impl Into<String>) -> Self {
    Self { tag_type, name: name.into() }
  }
}

/// How two tag readings are matched when following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkScope {
  /// Same tag type and same name.
  #[default]
  TypeAndName,
  /// Same name under any tag type.
  NameOnly,
}

impl LinkScope {
  pub fn links(&self, a: &TagKey, b: &TagKey) -> bool {
    match self {
      Self::TypeAndName => a == b,
      Self::NameOnly => a.name == b.name,
    }
  }
}

/// Read access to the encounter/tag join needed by [`resolve_closure`].
pub trait TagGraph {
  type Error;

  /// Every tag read during `encounter_id`.
  fn tags_of(&mut self, encounter_id: Uuid) -> Result<Vec<TagKey>, Self::Error>;

  /// Every encounter with a tag reading that `scope` links to `tag`.
  fn encounters_with(
    &mut self,
    tag: &TagKey,
    scope: LinkScope,
  ) -> Result<Vec<Uuid>, Self::Error>;
}

/// The result of [`resolve_closure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClosure {
  pub origin:     Uuid,
  /// Always contains `origin`.
  pub encounters: BTreeSet<Uuid>,
  pub tags:       BTreeSet<TagKey>,
  /// Lookup rounds performed; zero for an untagged encounter.
  pub rounds:     usize,
}

impl IdentityClosure {
  pub fn contains(&self, encounter_id: Uuid) -> bool { self.encounters.contains(&encounter_id) }
}

/// Compute every encounter transitively linked to `start` through shared tags.
pub fn resolve_closure<G: TagGraph>(
  graph: &mut G,
  start: Uuid,
  scope: LinkScope,
) -> Result<IdentityClosure, G::Error> {
  let mut known_encounters = BTreeSet::from([start]);
  let mut known_tags: BTreeSet<TagKey> = graph.tags_of(start)?.into_iter().collect();
  let mut frontier: Vec<TagKey> = known_tags.iter().cloned().collect();
  let mut rounds = 0;

  while !frontier.is_empty() {
    rounds += 1;

    let mut new_encounters = BTreeSet::new();
    for tag in &frontier {
      for id in graph.encounters_with(tag, scope)? {
        if !known_encounters.contains(&id) {
          new_encounters.insert(id);
        }
      }
    }
    known_encounters.extend(new_encounters.iter().copied());

    let mut new_tags = BTreeSet::new();
    for id in &new_encounters {
      for tag in graph.tags_of(*id)? {
        if !known_tags.contains(&tag) {
          new_tags.insert(tag);
        }
      }
    }
    known_tags.extend(new_tags.iter().cloned());

    tracing::debug!(
      %start,
      round = rounds,
      new_encounters = new_encounters.len(),
      new_tags = new_tags.len(),
      "identity closure round"
    );
    frontier = new_tags.into_iter().collect();
  }

  Ok(IdentityClosure {
    origin: start,
    encounters: known_encounters,
    tags: known_tags,
    rounds,
  })
}

// ─── Name inference ──────────────────────────────────────────────────────────

/// A tag reading together with the encounter it was made during.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSighting {
  pub encounter_id: Uuid,
  pub when:         DateTime<Utc>,
  pub tag:          TagValue,
}

/// Pick the animal's name from the tag readings of one identity closure.
///
/// Only flipper and PIT tags name animals, and only an encounter's primary
/// tag (lowest `tag_location`) counts. The earliest primary tag applied new
/// wins; without one, the earliest primary tag of any status does.
pub fn infer_name(sightings: &[TagSighting]) -> Option<String> {
  let mut primary: BTreeMap<Uuid, &TagSighting> = BTreeMap::new();
  for s in sightings.iter().filter(|s| s.tag.tag_type.names_animal()) {
    primary
      .entry(s.encounter_id)
      .and_modify(|best| {
        if (&s.tag.tag_location, &s.tag.name) < (&best.tag.tag_location, &best.tag.name) {
          *best = s;
        }
      })
      .or_insert(s);
  }

  primary
    .into_values()
    .min_by(|a, b| {
      (!a.tag.status.is_new(), a.when, &a.tag.name)
        .cmp(&(!b.tag.status.is_new(), b.when, &b.tag.name))
    })
    .map(|s| s.tag.name.clone())
}
