//! Word-level edit scripts between two texts.
//!
//! Texts are split into alternating whitespace / non-whitespace tokens and
//! aligned with a Ratcliff-Obershelp matcher (longest matching block first,
//! then recurse on both sides). As in difflib, elements that make up more
//! than 1% of a long second sequence cannot start a block. All offsets are
//! `char` offsets.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::model::{EditOp, OpKind};

/// Split `text` into maximal whitespace and non-whitespace runs.
///
/// Concatenating the tokens always reproduces `text`.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0usize;
    let mut run_is_space: Option<bool> = None;

    for (idx, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        match run_is_space {
            Some(prev) if prev != is_space => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        run_is_space = Some(is_space);
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Opcode {
    kind: OpKind,
    a_start: usize,
    a_end: usize,
    b_start: usize,
    b_end: usize,
}

/// Second sequences at least this long leave popular elements out of the index.
const AUTOJUNK_MIN_LEN: usize = 200;

struct Matcher<'a, T: Hash + Eq> {
    a: &'a [T],
    b: &'a [T],
    /// Positions of every non-popular element of `b`, ascending.
    b_index: HashMap<&'a T, Vec<usize>>,
    popular: HashSet<&'a T>,
}

impl<'a, T: Hash + Eq> Matcher<'a, T> {
    fn new(a: &'a [T], b: &'a [T]) -> Self {
        let mut b_index: HashMap<&'a T, Vec<usize>> = HashMap::new();
        for (j, item) in b.iter().enumerate() {
            b_index.entry(item).or_default().push(j);
        }

        // Popular: more than 1% of `b`. Whitespace tokens and common words
        // would otherwise make every row scan a large share of `b`.
        let mut popular = HashSet::new();
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b_index.retain(|item, positions| {
                let keep = positions.len() <= limit;
                if !keep {
                    popular.insert(*item);
                }
                keep
            });
        }

        Self {
            a,
            b,
            b_index,
            popular,
        }
    }

    /// Longest block with `a[i..i+k] == b[j..j+k]` inside the given ranges.
    ///
    /// Blocks are anchored on non-popular elements and may run through
    /// popular ones. Ties resolve to the earliest `i`. The winner is then
    /// widened over equal neighbours on both sides.
    fn longest_match(
        &self,
        a_lo: usize,
        a_hi: usize,
        b_lo: usize,
        b_hi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_len) = (a_lo, b_lo, 0usize);

        // `prev[t]` is the length of the run ending at `a[i - 1]`, `b[b_lo + t - 1]`.
        let width = b_hi.saturating_sub(b_lo);
        let mut prev = vec![0usize; width + 1];
        let mut cur = vec![0usize; width + 1];
        let mut prev_touched: Vec<usize> = Vec::new();
        let mut cur_touched: Vec<usize> = Vec::new();

        for i in a_lo..a_hi {
            let item = &self.a[i];
            if let Some(positions) = self.b_index.get(item) {
                let first = positions.partition_point(|&j| j < b_lo);
                for &j in &positions[first..] {
                    if j >= b_hi {
                        break;
                    }
                    let t = j - b_lo;
                    let k = prev[t] + 1;
                    cur[t + 1] = k;
                    cur_touched.push(t + 1);
                    if k > best_len {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_len = k;
                    }
                }
            } else if self.popular.contains(item) {
                for &t in &prev_touched {
                    let j = b_lo + t;
                    if j >= b_hi || self.b[j] != *item {
                        continue;
                    }
                    let k = prev[t] + 1;
                    cur[t + 1] = k;
                    cur_touched.push(t + 1);
                    if k > best_len {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_len = k;
                    }
                }
            }

            for &t in &prev_touched {
                prev[t] = 0;
            }
            prev_touched.clear();
            std::mem::swap(&mut prev, &mut cur);
            std::mem::swap(&mut prev_touched, &mut cur_touched);
        }

        if best_len == 0 {
            return (best_i, best_j, 0);
        }
        while best_i > a_lo && best_j > b_lo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_len += 1;
        }
        while best_i + best_len < a_hi
            && best_j + best_len < b_hi
            && self.a[best_i + best_len] == self.b[best_j + best_len]
        {
            best_len += 1;
        }

        (best_i, best_j, best_len)
    }

    fn matching_blocks(&self) -> Vec<(usize, usize, usize)> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((a_lo, a_hi, b_lo, b_hi)) = queue.pop() {
            let (i, j, k) = self.longest_match(a_lo, a_hi, b_lo, b_hi);
            if k == 0 {
                continue;
            }
            blocks.push((i, j, k));
            if a_lo < i && b_lo < j {
                queue.push((a_lo, i, b_lo, j));
            }
            if i + k < a_hi && j + k < b_hi {
                queue.push((i + k, a_hi, j + k, b_hi));
            }
        }
        blocks.sort_unstable();

        // Merge blocks that touch on both sides.
        let mut merged: Vec<(usize, usize, usize)> = Vec::with_capacity(blocks.len() + 1);
        for (i, j, k) in blocks {
            match merged.last_mut() {
                Some(last) if last.0 + last.2 == i && last.1 + last.2 == j => last.2 += k,
                _ => merged.push((i, j, k)),
            }
        }
        merged.push((self.a.len(), self.b.len(), 0));
        merged
    }

    fn opcodes(&self) -> Vec<Opcode> {
        let mut out = Vec::new();
        let (mut i, mut j) = (0usize, 0usize);

        for (a_start, b_start, len) in self.matching_blocks() {
            let kind = match (i < a_start, j < b_start) {
                (true, true) => Some(OpKind::Replace),
                (true, false) => Some(OpKind::Delete),
                (false, true) => Some(OpKind::Insert),
                (false, false) => None,
            };
            if let Some(kind) = kind {
                out.push(Opcode {
                    kind,
                    a_start: i,
                    a_end: a_start,
                    b_start: j,
                    b_end: b_start,
                });
            }
            i = a_start + len;
            j = b_start + len;
            if len > 0 {
                out.push(Opcode {
                    kind: OpKind::Equal,
                    a_start,
                    a_end: i,
                    b_start,
                    b_end: j,
                });
            }
        }

        out
    }
}

/// Align two token sequences into an edit script.
pub fn align(old_tokens: &[&str], new_tokens: &[&str]) -> Vec<EditOp> {
    let matcher = Matcher::new(old_tokens, new_tokens);
    matcher
        .opcodes()
        .into_iter()
        .map(|op| {
            let old = old_tokens[op.a_start..op.a_end].concat();
            let new = new_tokens[op.b_start..op.b_end].concat();
            match op.kind {
                OpKind::Equal => EditOp::equal(old),
                OpKind::Insert => EditOp::insert(new),
                OpKind::Delete => EditOp::delete(old),
                OpKind::Replace => EditOp::replace(old, new),
            }
        })
        .collect()
}

/// Compute the word-level edit script that rewrites `original` into `replacement`.
pub fn compute_script(original: &str, replacement: &str) -> Vec<EditOp> {
    align(&tokenize(original), &tokenize(replacement))
}

/// Translate a char offset inside `old_text` into an offset inside `new_text`.
///
/// Matching stretches map exactly and deleted stretches collapse onto their
/// insertion point. Inside a replaced stretch the offset is interpolated
/// linearly, which is only an approximation of where the content moved.
pub fn remap_offset(old_text: &str, new_text: &str, old_offset: usize) -> usize {
    let old: Vec<char> = old_text.chars().collect();
    let new: Vec<char> = new_text.chars().collect();

    if old_offset == 0 {
        return 0;
    }
    if old_offset >= old.len() {
        return new.len();
    }

    let matcher = Matcher::new(&old, &new);
    for op in matcher.opcodes() {
        if !(op.a_start <= old_offset && old_offset < op.a_end) {
            continue;
        }
        return match op.kind {
            OpKind::Equal => op.b_start + (old_offset - op.a_start),
            OpKind::Replace => {
                let span_old = (op.a_end - op.a_start).max(1) as f64;
                let span_new = (op.b_end - op.b_start) as f64;
                let ratio = (old_offset - op.a_start) as f64 / span_old;
                op.b_start + (ratio * span_new).round_ties_even() as usize
            }
            OpKind::Delete | OpKind::Insert => op.b_start,
        };
    }

    new.len()
}

/// Suffix of `s` starting at char offset `n`.
pub(crate) fn char_suffix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

/// Drop the part of `script` that lies before `start_offset` (original-text
/// coordinates).
///
/// Returns the remaining ops and the work units they no longer account for,
/// so progress can be computed against the full script. An op straddling the
/// offset is sliced; replaced text is sliced via [`remap_offset`].
pub fn trim(script: &[EditOp], start_offset: usize) -> (Vec<EditOp>, usize) {
    if start_offset == 0 {
        return (script.to_vec(), 0);
    }

    let mut remaining = Vec::new();
    let mut skipped_work = 0usize;
    let mut cursor = 0usize;

    for (idx, op) in script.iter().enumerate() {
        let old_len = op.old_len();

        if cursor + old_len <= start_offset {
            skipped_work += op.work();
            cursor += old_len;
            continue;
        }

        if start_offset <= cursor {
            remaining.extend_from_slice(&script[idx..]);
            break;
        }

        let offset = start_offset - cursor;
        match op.kind {
            OpKind::Equal => {
                skipped_work += offset;
                remaining.push(EditOp::equal(char_suffix(&op.old_text, offset)));
            }
            OpKind::Delete => {
                skipped_work += offset;
                remaining.push(EditOp::delete(char_suffix(&op.old_text, offset)));
            }
            OpKind::Replace => {
                let new_offset = remap_offset(&op.old_text, &op.new_text, offset);
                skipped_work += offset + new_offset;
                remaining.push(EditOp::replace(
                    char_suffix(&op.old_text, offset),
                    char_suffix(&op.new_text, new_offset),
                ));
            }
            OpKind::Insert => {
                skipped_work += op.work();
            }
        }
        remaining.extend_from_slice(&script[idx + 1..]);
        break;
    }

    (remaining, skipped_work)
}

pub fn total_work(script: &[EditOp]) -> usize {
    script.iter().map(EditOp::work).sum()
}

/// Length of the original text the script was computed from.
pub fn original_len(script: &[EditOp]) -> usize {
    script.iter().map(EditOp::old_len).sum()
}

/// Rebuild the original text from a script.
pub fn original_text(script: &[EditOp]) -> String {
    script
        .iter()
        .filter(|op| op.kind != OpKind::Insert)
        .map(|op| op.old_text.as_str())
        .collect()
}

/// Rebuild the target text from a script.
pub fn target_text(script: &[EditOp]) -> String {
    script
        .iter()
        .filter(|op| op.kind != OpKind::Delete)
        .map(|op| op.new_text.as_str())
        .collect()
}
