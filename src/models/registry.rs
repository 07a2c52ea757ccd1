use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::subscription::Subscription;
use crate::error::{BridgeError, Result};

/// Every subscription known to the bridge, indexed two ways.
///
/// `by_channel` answers "what is this channel subscribed to", `by_key` answers
/// "which channels get a post for this repository". A `(channel, key)` pair is
/// present in `by_channel` exactly when `channel` appears once in `by_key[key]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawSubscriptions")]
pub struct Subscriptions {
    #[serde(rename = "byChannel")]
    by_channel: BTreeMap<String, BTreeMap<String, Subscription>>,
    #[serde(rename = "byKey")]
    by_key: BTreeMap<String, Vec<String>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the stored blob. Absent or empty bytes are an empty registry,
    /// anything else that fails to parse is reported as corrupt.
    pub fn from_bytes(key: &str, bytes: Option<&[u8]>) -> Result<Self> {
        let bytes = match bytes {
            Some(b) if !b.iter().all(u8::is_ascii_whitespace) => b,
            _ => return Ok(Self::default()),
        };

        let decoded: Option<Self> =
            serde_json::from_slice(bytes).map_err(|e| BridgeError::corrupt(key, e))?;
        Ok(decoded.unwrap_or_default())
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Returns false when the channel was already subscribed to this repository
    pub fn add(&mut self, subscription: Subscription) -> bool {
        let key = subscription.key();

        let channels = self.by_key.entry(key.clone()).or_default();
        let inserted = !channels.contains(&subscription.channel_id);
        if inserted {
            channels.push(subscription.channel_id.clone());
        }

        self.by_channel
            .entry(subscription.channel_id.clone())
            .or_default()
            .insert(key, subscription);

        inserted
    }

    /// Returns false when there was nothing to remove
    pub fn remove(&mut self, subscription: &Subscription) -> bool {
        let key = subscription.key();
        let channel_id = &subscription.channel_id;

        let mut removed = false;
        if let Some(entries) = self.by_channel.get_mut(channel_id) {
            removed = entries.remove(&key).is_some();
            if entries.is_empty() {
                self.by_channel.remove(channel_id);
            }
        }

        if let Some(channels) = self.by_key.get_mut(&key) {
            let before = channels.len();
            channels.retain(|c| c != channel_id);
            removed |= channels.len() != before;
            if channels.is_empty() {
                self.by_key.remove(&key);
            }
        }

        removed
    }

    /// Channels to notify for the repository identity of `subscription`
    pub fn channel_ids(&self, subscription: &Subscription) -> Vec<String> {
        self.by_key
            .get(&subscription.key())
            .cloned()
            .unwrap_or_default()
    }

    pub fn list(&self, channel_id: &str) -> Vec<Subscription> {
        self.by_channel
            .get(channel_id)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty() && self.by_key.is_empty()
    }
}

/// Accepts the current field names, the legacy `ByChannelID` / `ByKey`
/// names, and `null` wherever a map or list is expected.
#[derive(Deserialize)]
struct RawSubscriptions {
    #[serde(rename = "byChannel", alias = "ByChannelID", default)]
    by_channel: Option<BTreeMap<String, Option<BTreeMap<String, Subscription>>>>,
    #[serde(rename = "byKey", alias = "ByKey", default)]
    by_key: Option<BTreeMap<String, Option<Vec<String>>>>,
}

impl From<RawSubscriptions> for Subscriptions {
    fn from(raw: RawSubscriptions) -> Self {
        let by_channel = raw
            .by_channel
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(channel, entries)| entries.filter(|e| !e.is_empty()).map(|e| (channel, e)))
            .collect();

        let by_key = raw
            .by_key
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, channels)| {
                let mut channels = channels.unwrap_or_default();
                let mut seen = std::collections::HashSet::new();
                channels.retain(|c| seen.insert(c.clone()));
                (!channels.is_empty()).then_some((key, channels))
            })
            .collect();

        Self { by_channel, by_key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(org: &str, repo: &str, channel: &str) -> Subscription {
        Subscription {
            vcs_kind: "github".to_string(),
            base_url: "https://github.com".to_string(),
            org_name: org.to_string(),
            repo_name: repo.to_string(),
            channel_id: channel.to_string(),
        }
    }

    fn assert_consistent(list: &Subscriptions) {
        for (channel, entries) in &list.by_channel {
            for key in entries.keys() {
                let count = list.by_key[key].iter().filter(|c| *c == channel).count();
                assert_eq!(count, 1, "channel {} listed {} times for {}", channel, count, key);
            }
        }
        for (key, channels) in &list.by_key {
            for channel in channels {
                assert!(list.by_channel[channel].contains_key(key));
            }
        }
    }

    #[test]
    fn test_add_twice_does_not_duplicate() {
        let mut list = Subscriptions::new();
        assert!(list.add(sub("acme", "widgets", "C1")));
        assert!(!list.add(sub("acme", "widgets", "C1")));

        assert_eq!(list.channel_ids(&sub("acme", "widgets", "")), vec!["C1".to_string()]);
        assert_eq!(list.list("C1").len(), 1);
        assert_consistent(&list);
    }

    #[test]
    fn test_add_then_remove_restores_original() {
        let mut list = Subscriptions::new();
        list.add(sub("acme", "gadgets", "C1"));
        list.add(sub("acme", "widgets", "C2"));
        let original = list.clone();

        let s = sub("acme", "widgets", "C1");
        list.add(s.clone());
        assert_consistent(&list);
        assert!(list.remove(&s));

        assert_eq!(list, original);
        assert_consistent(&list);
    }

    #[test]
    fn test_remove_filters_only_that_channel() {
        let mut list = Subscriptions::new();
        list.add(sub("acme", "widgets", "C1"));
        list.add(sub("acme", "widgets", "C2"));
        list.add(sub("acme", "widgets", "C3"));

        list.remove(&sub("acme", "widgets", "C2"));

        assert_eq!(
            list.channel_ids(&sub("acme", "widgets", "")),
            vec!["C1".to_string(), "C3".to_string()]
        );
        assert!(list.list("C2").is_empty());
        assert_consistent(&list);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut list = Subscriptions::new();
        list.add(sub("acme", "widgets", "C1"));
        let before = list.clone();

        assert!(!list.remove(&sub("acme", "widgets", "C9")));
        assert!(!list.remove(&sub("other", "repo", "C1")));
        assert_eq!(list, before);
    }

    #[test]
    fn test_list_returns_every_subscription_of_channel() {
        let mut list = Subscriptions::new();
        let repos = ["widgets", "gadgets", "gizmos"];
        for repo in repos {
            list.add(sub("acme", repo, "C1"));
        }
        list.add(sub("acme", "widgets", "C2"));

        let mut names: Vec<String> = list.list("C1").into_iter().map(|s| s.repo_name).collect();
        names.sort();
        assert_eq!(names, vec!["gadgets", "gizmos", "widgets"]);
        assert!(list.list("C404").is_empty());
    }

    #[test]
    fn test_channel_ids_unknown_repo_is_empty() {
        let list = Subscriptions::new();
        assert!(list.channel_ids(&sub("acme", "widgets", "")).is_empty());
    }

    #[test]
    fn test_from_bytes_absent_and_empty() {
        assert!(Subscriptions::from_bytes("subscriptions", None).unwrap().is_empty());
        assert!(Subscriptions::from_bytes("subscriptions", Some(b"")).unwrap().is_empty());
        assert!(Subscriptions::from_bytes("subscriptions", Some(b"null")).unwrap().is_empty());
    }

    #[test]
    fn test_from_bytes_corrupt_is_error() {
        let err = Subscriptions::from_bytes("subscriptions", Some(b"{not json")).unwrap_err();
        assert!(matches!(err, BridgeError::CorruptData { .. }));

        let err = Subscriptions::from_bytes("subscriptions", Some(b"[1,2,3]")).unwrap_err();
        assert!(matches!(err, BridgeError::CorruptData { .. }));
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut list = Subscriptions::new();
        list.add(sub("acme", "widgets", "C1"));
        list.add(sub("acme", "widgets", "C2"));

        let bytes = list.to_bytes().unwrap();
        let decoded = Subscriptions::from_bytes("subscriptions", Some(&bytes)).unwrap();
        assert_eq!(decoded, list);

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.get("byChannel").is_some());
        assert!(json.get("byKey").is_some());
    }

    #[test]
    fn test_reads_legacy_shape() {
        let s = sub("acme", "widgets", "C1");
        let legacy = serde_json::json!({
            "ByChannelID": { "C1": { s.key(): s }, "C2": null },
            "ByKey": { s.key(): ["C1", "C1"], "stale": null }
        });

        let list = Subscriptions::from_bytes("subscriptions", Some(legacy.to_string().as_bytes())).unwrap();
        assert_eq!(list.channel_ids(&s), vec!["C1".to_string()]);
        assert_eq!(list.list("C1"), vec![s]);
        assert!(list.list("C2").is_empty());
        assert_consistent(&list);
    }
}
