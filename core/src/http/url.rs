/*
 * url.rs
 * Copyright (C) 2026 the Velocystream contributors
 *
 * This file is part of Velocystream, a client driver for document-oriented
 * databases over VST and HTTP.
 *
 * Velocystream is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Velocystream is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Velocystream.  If not, see <http://www.gnu.org/licenses/>.
 */

//! `create_safe_dotted_curl_url` (§4.5): libcurl collapses `.` and `..`
//! path segments. To preserve document keys and paths that happen to
//! contain a literal dot, every `/.` whose next character is `/`, `#`, `?`,
//! or end-of-string gets its dot rewritten to `%2E` before the URL is ever
//! handed to curl. A `/.` that is part of `/..` (next char also `.`) is
//! left alone, since that really is a parent-segment reference.

/// Rewrite `/.` occurrences that libcurl would otherwise collapse.
/// Idempotent: running it twice gives the same result as running it once,
/// since the rewritten form no longer contains a bare `/.` followed by a
/// path boundary (it contains `/%2E`, whose `.` is the second character of
/// `%2E`, not a fresh `/.` occurrence).
pub fn create_safe_dotted_curl_url(url: &str) -> String {
    let bytes = url.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'.' {
            let next = bytes.get(i + 2).copied();
            let boundary = matches!(next, None | Some(b'/') | Some(b'#') | Some(b'?'));
            out.push(b'/');
            if boundary {
                out.extend_from_slice(b"%2E");
            } else {
                out.push(b'.');
            }
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    // `url` is valid UTF-8 and every byte we appended is either copied
    // verbatim or part of an ASCII literal, so the result is valid UTF-8.
    String::from_utf8(out).expect("rewriting preserves UTF-8 validity")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_dot_segment_before_slash() {
        let out = create_safe_dotted_curl_url("/db/collection/./doc");
        assert_eq!(out, "/db/collection/%2E/doc");
    }

    #[test]
    fn leaves_dotdot_segment_intact() {
        let out = create_safe_dotted_curl_url("/db/collection/../doc");
        assert_eq!(out, "/db/collection/../doc");
    }

    #[test]
    fn scenario_d_from_spec() {
        let out = create_safe_dotted_curl_url("/db/collection/./doc/../x");
        assert_eq!(out, "/db/collection/%2E/doc/../x");
    }

    #[test]
    fn trailing_dot_at_end_of_string_is_rewritten() {
        let out = create_safe_dotted_curl_url("/db/collection/.");
        assert_eq!(out, "/db/collection/%2E");
    }

    #[test]
    fn dot_before_query_or_fragment_is_rewritten() {
        assert_eq!(create_safe_dotted_curl_url("/a/.?q=1"), "/a/%2E?q=1");
        assert_eq!(create_safe_dotted_curl_url("/a/.#frag"), "/a/%2E#frag");
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "/db/collection/./doc/../x",
            "/a/.",
            "/a/..",
            "plain/path/no/dots",
            "/a/.b", // dot not at a boundary, left alone
        ];
        for input in inputs {
            let once = create_safe_dotted_curl_url(input);
            let twice = create_safe_dotted_curl_url(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn dot_not_at_boundary_is_untouched() {
        assert_eq!(create_safe_dotted_curl_url("/a/.b/c"), "/a/.b/c");
    }
}
