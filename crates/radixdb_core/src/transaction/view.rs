//! Merged read view of a base trie and a transaction overlay.

use super::state::{Overlay, PendingWrite};
use crate::trie::{RadixTrie, TriePath};
use crate::types::{prefix_successor, SeekMode};

/// A key/value pair borrowed from a view.
pub(crate) type Entry<'a> = (Vec<u8>, &'a [u8]);

/// Keys visible to a transaction: overlay puts, plus base keys that are
/// neither overwritten, deleted nor under a dropped prefix.
///
/// Navigation runs one candidate search in the base and one in the overlay
/// and keeps the nearer of the two, so no merged copy is ever built.
#[derive(Debug, Clone, Copy)]
pub(crate) struct View<'a> {
    base: &'a RadixTrie<Vec<u8>>,
    overlay: Option<&'a Overlay>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl<'a> View<'a> {
    pub(crate) fn new(base: &'a RadixTrie<Vec<u8>>, overlay: Option<&'a Overlay>) -> Self {
        Self { base, overlay }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&'a [u8]> {
        if let Some(overlay) = self.overlay {
            match overlay.writes.get(key) {
                Some(PendingWrite::Put(value)) => return Some(value),
                Some(PendingWrite::Delete) => return None,
                None if overlay.hides(key) => return None,
                None => {}
            }
        }
        self.base.get(key).map(Vec::as_slice)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    pub(crate) fn first(&self) -> Option<Entry<'a>> {
        self.pick(
            self.base.first(),
            self.overlay.and_then(|o| o.writes.first()),
            Direction::Forward,
        )
    }

    pub(crate) fn last(&self) -> Option<Entry<'a>> {
        self.pick(
            self.base.last(),
            self.overlay.and_then(|o| o.writes.last()),
            Direction::Backward,
        )
    }

    /// Smallest visible key strictly greater than `key`.
    pub(crate) fn successor(&self, key: &[u8]) -> Option<Entry<'a>> {
        self.pick(
            self.base.seek_after(key),
            self.overlay.and_then(|o| o.writes.seek_after(key)),
            Direction::Forward,
        )
    }

    /// Largest visible key strictly less than `key`.
    pub(crate) fn predecessor(&self, key: &[u8]) -> Option<Entry<'a>> {
        self.pick(
            self.base.seek_before(key),
            self.overlay.and_then(|o| o.writes.seek_before(key)),
            Direction::Backward,
        )
    }

    pub(crate) fn seek(&self, key: &[u8], mode: SeekMode) -> Option<Entry<'a>> {
        match mode {
            SeekMode::Eq => self.get(key).map(|value| (key.to_vec(), value)),
            SeekMode::Ge => self.pick(
                self.base.seek(key, SeekMode::Ge),
                self.overlay.and_then(|o| o.writes.seek(key, SeekMode::Ge)),
                Direction::Forward,
            ),
            SeekMode::Le => self.pick(
                self.base.seek(key, SeekMode::Le),
                self.overlay.and_then(|o| o.writes.seek(key, SeekMode::Le)),
                Direction::Backward,
            ),
        }
    }

    /// Combines the base and overlay candidates found from the same probe.
    fn pick(
        &self,
        base: Option<TriePath>,
        delta: Option<TriePath>,
        direction: Direction,
    ) -> Option<Entry<'a>> {
        let base = self.visible_base(base, direction);
        let delta = self.live_delta(delta, direction);
        match (base, delta) {
            (None, None) => None,
            (Some(base), None) => self.base_entry(&base),
            (None, Some(delta)) => self.delta_entry(&delta),
            (Some(base), Some(delta)) => {
                let delta_wins = match direction {
                    Direction::Forward => delta.key() < base.key(),
                    Direction::Backward => delta.key() > base.key(),
                };
                if delta_wins {
                    self.delta_entry(&delta)
                } else {
                    self.base_entry(&base)
                }
            }
        }
    }

    /// Moves a base candidate past keys the overlay overrides or hides.
    fn visible_base(&self, mut path: Option<TriePath>, direction: Direction) -> Option<TriePath> {
        let Some(overlay) = self.overlay else {
            return path;
        };
        loop {
            let mut current = path?;
            let key = current.key();

            if let Some(len) = overlay.dropped.prefix_len_of(key) {
                // Jump over the whole dropped range in one seek.
                let prefix = &key[..len];
                path = match direction {
                    Direction::Forward => prefix_successor(prefix)
                        .and_then(|next| self.base.seek(&next, SeekMode::Ge)),
                    Direction::Backward => self.base.seek_before(prefix),
                };
                continue;
            }

            if overlay.writes.get(key).is_none() {
                return Some(current);
            }
            let moved = match direction {
                Direction::Forward => self.base.next(&mut current),
                Direction::Backward => self.base.prev(&mut current),
            };
            path = moved.then_some(current);
        }
    }

    /// Moves an overlay candidate past tombstones.
    fn live_delta(&self, path: Option<TriePath>, direction: Direction) -> Option<TriePath> {
        let writes = &self.overlay?.writes;
        let mut path = path?;
        loop {
            if let Some(PendingWrite::Put(_)) = writes.value_at(&path) {
                return Some(path);
            }
            let moved = match direction {
                Direction::Forward => writes.next(&mut path),
                Direction::Backward => writes.prev(&mut path),
            };
            if !moved {
                return None;
            }
        }
    }

    fn base_entry(&self, path: &TriePath) -> Option<Entry<'a>> {
        let value = self.base.value_at(path)?;
        Some((path.key().to_vec(), value.as_slice()))
    }

    fn delta_entry(&self, path: &TriePath) -> Option<Entry<'a>> {
        match self.overlay?.writes.value_at(path)? {
            PendingWrite::Put(value) => Some((path.key().to_vec(), value.as_slice())),
            PendingWrite::Delete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_of(pairs: &[(&str, &str)]) -> RadixTrie<Vec<u8>> {
        let mut base = RadixTrie::new();
        for (k, v) in pairs {
            base.insert(k.as_bytes(), v.as_bytes().to_vec());
        }
        base
    }

    fn keys_forward(view: &View<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut next = view.first();
        while let Some((key, _)) = next {
            next = view.successor(&key);
            out.push(String::from_utf8(key).unwrap());
        }
        out
    }

    fn keys_backward(view: &View<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut next = view.last();
        while let Some((key, _)) = next {
            next = view.predecessor(&key);
            out.push(String::from_utf8(key).unwrap());
        }
        out
    }

    #[test]
    fn base_only_view() {
        let base = base_of(&[("a", "1"), ("ab", "2"), ("b", "3")]);
        let view = View::new(&base, None);

        assert_eq!(view.get(b"ab"), Some(&b"2"[..]));
        assert_eq!(keys_forward(&view), ["a", "ab", "b"]);
        assert_eq!(keys_backward(&view), ["b", "ab", "a"]);
    }

    #[test]
    fn overlay_puts_shadow_base_values() {
        let base = base_of(&[("a", "1"), ("c", "3")]);
        let mut overlay = Overlay::default();
        overlay.put(b"b", b"2".to_vec());
        overlay.put(b"c", b"new".to_vec());
        let view = View::new(&base, Some(&overlay));

        assert_eq!(view.get(b"c"), Some(&b"new"[..]));
        assert_eq!(keys_forward(&view), ["a", "b", "c"]);
        assert_eq!(keys_backward(&view), ["c", "b", "a"]);
    }

    #[test]
    fn tombstones_hide_base_keys() {
        let base = base_of(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let mut overlay = Overlay::default();
        overlay.delete(b"b", &base);
        let view = View::new(&base, Some(&overlay));

        assert_eq!(view.get(b"b"), None);
        assert_eq!(keys_forward(&view), ["a", "c"]);
        assert_eq!(keys_backward(&view), ["c", "a"]);
        assert_eq!(view.seek(b"b", SeekMode::Ge).unwrap().0, b"c");
        assert_eq!(view.seek(b"b", SeekMode::Le).unwrap().0, b"a");
        assert!(view.seek(b"b", SeekMode::Eq).is_none());
    }

    #[test]
    fn dropped_prefixes_hide_ranges() {
        let base = base_of(&[
            ("other-prefix", "o"),
            ("to-delete-1", "1"),
            ("to-delete-2", "2"),
            ("zulu", "z"),
        ]);
        let mut overlay = Overlay::default();
        overlay.delete_prefix(b"to-delete", &base);
        overlay.put(b"to-delete-3", b"3".to_vec());
        let view = View::new(&base, Some(&overlay));

        assert_eq!(view.get(b"to-delete-1"), None);
        assert_eq!(keys_forward(&view), ["other-prefix", "to-delete-3", "zulu"]);
        assert_eq!(keys_backward(&view), ["zulu", "to-delete-3", "other-prefix"]);
    }

    #[test]
    fn everything_dropped_is_empty() {
        let base = base_of(&[("k1", "1"), ("k2", "2")]);
        let mut overlay = Overlay::default();
        overlay.delete_prefix(b"k", &base);
        let view = View::new(&base, Some(&overlay));

        assert!(view.is_empty());
        assert!(view.last().is_none());
        assert!(view.seek(b"k", SeekMode::Ge).is_none());
    }

    #[test]
    fn all_ff_prefix_has_no_successor_range() {
        let mut base = RadixTrie::new();
        base.insert(&[0xff, 0xff, 1], b"x".to_vec());
        base.insert(b"a", b"y".to_vec());
        let mut overlay = Overlay::default();
        overlay.delete_prefix(&[0xff, 0xff], &base);
        let view = View::new(&base, Some(&overlay));

        assert_eq!(view.successor(b"a"), None);
        assert_eq!(view.last().unwrap().0, b"a");
    }
}
