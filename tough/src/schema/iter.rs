// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use std::collections::HashMap;
use std::slice;

/// Iterates over the keys belonging to a role, in the order its `keyids` list declares them.
pub(super) struct KeysIter<'a> {
    pub(super) keyids_iter: slice::Iter<'a, Decoded<Hex>>,
    pub(super) keys: &'a HashMap<Decoded<Hex>, Key>,
}

impl<'a> Iterator for KeysIter<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let keyid = self.keyids_iter.next()?;
            if let Some(key) = self.keys.get(keyid) {
                return Some(key);
            }
            // A keyid with no corresponding entry in `keys` is ignored rather than treated as
            // an error here; `Root::keys` callers only care about keys they can actually use.
        }
    }
}
