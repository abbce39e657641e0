//! The canonical identity of a merge: the sorted, deduplicated set of
//! (run, lane, tag) components that go into it.

use anyhow::{bail, ensure, Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Separator between components in an rpt list.
pub const RPT_LIST_SEPARATOR: &str = ";";

/// Separator between the fields of one rpt.
const RPT_FIELD_SEPARATOR: char = ':';

/// One lane of one sequencing run, optionally restricted to a single tag.
///
/// The derived ordering is the canonical one: numeric run, then lane, then
/// tag, with an untagged component sorting before any tagged one.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Component {
    pub id_run: u32,
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_index: Option<u32>,
}

impl Component {
    pub fn new(id_run: u32, position: u32, tag_index: Option<u32>) -> Self {
        Component {
            id_run,
            position,
            tag_index,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id_run, self.position)?;
        if let Some(tag_index) = self.tag_index {
            write!(f, ":{tag_index}")?;
        }
        Ok(())
    }
}

impl FromStr for Component {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Component> {
        let fields: Vec<&str> = s.trim().split(RPT_FIELD_SEPARATOR).collect();
        let parse = |field: &str, name: &str| -> Result<u32> {
            field
                .parse()
                .with_context(|| format!("invalid {name} '{field}' in rpt '{s}'"))
        };
        match fields.as_slice() {
            [id_run, position] => Ok(Component::new(
                parse(id_run, "run id")?,
                parse(position, "position")?,
                None,
            )),
            [id_run, position, tag_index] => Ok(Component::new(
                parse(id_run, "run id")?,
                parse(position, "position")?,
                Some(parse(tag_index, "tag index")?),
            )),
            _ => bail!("expected run:position[:tag_index], got '{s}'"),
        }
    }
}

#[derive(Serialize)]
struct CanonicalComposition<'a> {
    components: &'a [Component],
}

/// A non-empty, sorted and deduplicated set of components, together with its
/// digest. Two compositions built from the same components in any order are
/// equal and share a digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Composition {
    components: Vec<Component>,
    digest: String,
}

impl Composition {
    pub fn new(components: impl IntoIterator<Item = Component>) -> Result<Self> {
        let components: Vec<Component> = components
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        ensure!(!components.is_empty(), "a composition needs at least one component");
        let json = serde_json::to_string(&CanonicalComposition {
            components: &components,
        })?;
        let digest = hex::encode(Sha256::digest(json.as_bytes()));
        Ok(Composition { components, digest })
    }

    /// The components in canonical order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Hex encoded SHA-256 of the canonical JSON form of this composition.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The canonical JSON form `{"components":[{"id_run":..,"position":..},..]}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&CanonicalComposition {
            components: &self.components,
        })?)
    }

    /// The components rendered as `run:lane[:tag]` joined by `;`.
    pub fn rpt_list(&self) -> String {
        self.components.iter().join(RPT_LIST_SEPARATOR)
    }

    /// Components present in both compositions, in canonical order.
    pub fn shared_components(&self, other: &Composition) -> Vec<Component> {
        self.components
            .iter()
            .filter(|c| other.components.binary_search(c).is_ok())
            .copied()
            .collect()
    }

    pub fn intersects(&self, other: &Composition) -> bool {
        self.components
            .iter()
            .any(|c| other.components.binary_search(c).is_ok())
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rpt_list())
    }
}

impl FromStr for Composition {
    type Err = anyhow::Error;

    /// Parse an rpt list such as `26219:1:3;26219:2:3`.
    fn from_str(s: &str) -> Result<Composition> {
        let components: Vec<Component> = s
            .split(RPT_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|rpt| !rpt.is_empty())
            .map(Component::from_str)
            .collect::<Result<_>>()?;
        Composition::new(components).with_context(|| format!("invalid rpt list '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rpt(s: &str) -> Component {
        s.parse().unwrap()
    }

    #[test]
    fn test_component_order() {
        let mut components = vec![
            rpt("10:1:2"),
            rpt("9:2"),
            rpt("10:1"),
            rpt("10:1:1"),
            rpt("9:1"),
        ];
        components.sort();
        assert_eq!(
            components.iter().join(";"),
            "9:1;9:2;10:1;10:1:1;10:1:2"
        );
    }

    #[test]
    fn test_parse_component() {
        assert_eq!(rpt("26219:1:3"), Component::new(26219, 1, Some(3)));
        assert_eq!(rpt(" 26219:2 "), Component::new(26219, 2, None));
        assert!("26219".parse::<Component>().is_err());
        assert!("26219:x".parse::<Component>().is_err());
        assert!("1:2:3:4".parse::<Component>().is_err());
    }

    #[test]
    fn test_order_independent_digest() -> Result<()> {
        let a: Composition = "1:2;1:1;3:1:5".parse()?;
        let b: Composition = "3:1:5;1:1;1:2;1:1".parse()?;
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.rpt_list(), "1:1;1:2;3:1:5");
        assert_eq!(a.num_components(), 3);
        Ok(())
    }

    #[test]
    fn test_digest_of_canonical_json() -> Result<()> {
        let c: Composition = "1:2;1:1".parse()?;
        assert_eq!(
            c.to_json()?,
            r#"{"components":[{"id_run":1,"position":1},{"id_run":1,"position":2}]}"#
        );
        assert_eq!(
            c.digest(),
            "c355f9a6579152ad27d164594da4be649661a53f369e5a89c2196d8277b936f2"
        );

        let tagged: Composition = "26219:2:3;26219:1:3".parse()?;
        assert_eq!(
            tagged.digest(),
            "e3dcfcb6d9c2876e2febe52ab5b778d8c2de2a314f24c63d7a3e209a7d009bf9"
        );
        Ok(())
    }

    #[test]
    fn test_different_components_differ() -> Result<()> {
        let a: Composition = "1:1;1:2".parse()?;
        let b: Composition = "1:1;1:2:1".parse()?;
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
        Ok(())
    }

    #[test]
    fn test_intersection() -> Result<()> {
        let queued: Composition = "1:1;1:2".parse()?;
        let superset: Composition = "1:1;1:2;1:3".parse()?;
        let disjoint: Composition = "2:1;2:2".parse()?;
        assert!(superset.intersects(&queued));
        assert!(!superset.intersects(&disjoint));
        assert_eq!(
            superset.shared_components(&queued),
            vec![rpt("1:1"), rpt("1:2")]
        );
        Ok(())
    }

    #[test]
    fn test_empty_composition() {
        assert!("".parse::<Composition>().is_err());
        assert!(" ; ".parse::<Composition>().is_err());
        assert!(Composition::new(Vec::new()).is_err());
    }
}
