//! Stable artifact naming.
//!
//! Bundlers embed content hashes in output filenames (`app.a43ff0.js`) to
//! bust caches. To track the same logical file across builds we strip the
//! hash and use the remaining name as the identifier. Detecting the hash
//! segment is a heuristic: we try to be smart without trying too hard.

use std::path::MAIN_SEPARATOR;

/// Characters that separate the parts of a filename.
const SEPARATOR_CHARACTERS: &str = "._:-";

/// Minimum length for a segment to be considered a hash.
const MIN_HASH_LENGTH: usize = 5;

/// Result of stripping a hash from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The filename with the hash segment removed.
    pub filename: String,
    /// The removed hash, or an empty string if none was found.
    pub hash: String,
}

/// Strip a known base folder prefix from a path, making it project-relative.
///
/// A no-op when `base_folder` is not a literal prefix of `full_file_name`.
/// After stripping, a single leading path separator is removed as well.
/// Both paths must already be normalized to the platform convention.
pub fn remove_base_folder(base_folder: &str, full_file_name: &str) -> String {
    match full_file_name.strip_prefix(base_folder) {
        Some(rest) => rest
            .strip_prefix(MAIN_SEPARATOR)
            .unwrap_or(rest)
            .to_string(),
        None => full_file_name.to_string(),
    }
}

/// Detect and remove a content hash embedded in a filename.
///
/// Only the basename is examined; any directory portion is held aside and
/// reattached unchanged. Total function: malformed input falls through the
/// "too few parts" or "no candidates" paths and comes back unchanged.
pub fn remove_file_name_hash(file_name: &str) -> Extraction {
    let (directory, basename) = split_directory(file_name);

    let segments = split_segments(basename);

    // At least three non-separator parts are needed (a base, a hash, an
    // extension). Anything shorter has nothing for us to do.
    if count_word_segments(&segments) < 3 {
        return Extraction {
            filename: file_name.to_string(),
            hash: String::new(),
        };
    }

    let candidates = hash_candidate_indices(&segments);
    let Some(chosen) = select_candidate(&candidates, segments.len()) else {
        return Extraction {
            filename: file_name.to_string(),
            hash: String::new(),
        };
    };

    let (new_basename, hash) = rebuild_without(&segments, chosen);
    Extraction {
        filename: format!("{directory}{new_basename}"),
        hash,
    }
}

/// Split a path into its directory portion (separator included) and basename.
fn split_directory(file_name: &str) -> (&str, &str) {
    match file_name.rfind(MAIN_SEPARATOR) {
        Some(idx) => (&file_name[..=idx], &file_name[idx + 1..]),
        None => ("", file_name),
    }
}

fn is_separator_char(c: char) -> bool {
    SEPARATOR_CHARACTERS.contains(c)
}

/// Split a basename into maximal runs of separator and non-separator
/// characters. Consecutive segments never share a classification.
fn split_segments(basename: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut prev_is_sep = None;

    for (idx, c) in basename.char_indices() {
        let is_sep = is_separator_char(c);
        if let Some(prev) = prev_is_sep {
            if prev != is_sep {
                segments.push(&basename[start..idx]);
                start = idx;
            }
        }
        prev_is_sep = Some(is_sep);
    }
    if start < basename.len() {
        segments.push(&basename[start..]);
    }

    segments
}

/// Count segments containing at least one non-separator character.
fn count_word_segments(segments: &[&str]) -> usize {
    segments
        .iter()
        .filter(|seg| seg.chars().any(|c| !is_separator_char(c)))
        .count()
}

/// Indices of segments that could be a hash: min. 5 characters, all
/// hexadecimal. A pure-letter segment outside a-f never qualifies, nor
/// does a short hex run like a 4-digit port number.
fn hash_candidate_indices(segments: &[&str]) -> Vec<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, seg)| {
            seg.len() >= MIN_HASH_LENGTH && seg.chars().all(|c| c.is_ascii_hexdigit())
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Pick the candidate to remove.
///
/// Preference goes to the last candidate, except when it is also the very
/// last segment of the sequence: that looks like a trailing extension
/// (`.12345`), so the second-to-last candidate is used instead. With three
/// or more candidates the fallback is still that single step back, not a
/// re-scan.
fn select_candidate(candidates: &[usize], segment_count: usize) -> Option<usize> {
    match candidates {
        [] => None,
        [only] => Some(*only),
        [.., before_last, last] => {
            if *last == segment_count - 1 {
                Some(*before_last)
            } else {
                Some(*last)
            }
        }
    }
}

/// Rebuild the basename without the segment at `index`, cleaning up the
/// separator that removal leaves behind. Returns the new basename and the
/// removed segment.
fn rebuild_without(segments: &[&str], index: usize) -> (String, String) {
    let hash = segments[index].to_string();

    let mut parts: Vec<&str> = Vec::with_capacity(segments.len() - 1);
    parts.extend_from_slice(&segments[..index]);
    parts.extend_from_slice(&segments[index + 1..]);

    // One adjacent separator run is now redundant: the one that followed the
    // removed segment when it led the sequence, otherwise the one before it.
    let adjust = if index == 0 { 0 } else { index - 1 };
    if parts[adjust].len() == 1 {
        parts.remove(adjust);
    } else {
        // Separator characters are ASCII, so byte slicing is safe.
        parts[adjust] = &parts[adjust][..parts[adjust].len() - 1];
    }

    (parts.concat(), hash)
}
