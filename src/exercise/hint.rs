// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Progressive hints: the expected answer with its letters masked out.

pub const MASK: char = '•';

/// Masks every letter and digit of `answer` except the first one of each
/// word.
pub fn mask(answer: &str) -> String {
    let mut at_word_start = true;
    answer
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                let keep = at_word_start;
                at_word_start = false;
                if keep { c } else { MASK }
            } else {
                at_word_start = c.is_whitespace();
                c
            }
        })
        .collect()
}

/// Reveals the leftmost masked character.
pub fn unmask_next(hint: &str, answer: &str) -> String {
    let mut done = false;
    hint.chars()
        .zip(answer.chars())
        .map(|(h, a)| {
            if !done && h == MASK && a != MASK {
                done = true;
                a
            } else {
                h
            }
        })
        .collect()
}

/// Reveals the characters in `start..end`, counted in chars.
pub fn unmask_range(hint: &str, answer: &str, start: usize, end: usize) -> String {
    hint.chars()
        .zip(answer.chars())
        .enumerate()
        .map(|(i, (h, a))| if (start..end).contains(&i) { a } else { h })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("Paris"), "P••••");
        assert_eq!(mask("New York, 1998"), "N•• Y•••, 1•••");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn test_unmask_next() {
        let answer = "New York";
        let hint = mask(answer);
        let hint = unmask_next(&hint, answer);
        assert_eq!(hint, "Ne• Y•••");
        let hint = unmask_next(&hint, answer);
        assert_eq!(hint, "New Y•••");
        let hint = unmask_next(&hint, answer);
        assert_eq!(hint, "New Yo••");
    }

    #[test]
    fn test_unmask_range() {
        let answer = "Moscow";
        assert_eq!(unmask_range(&mask(answer), answer, 3, 5), "M••co•");
    }

    #[test]
    fn test_fully_revealed() {
        let answer = "ab";
        let hint = unmask_next(&mask(answer), answer);
        assert!(!hint.contains(MASK));
        assert_eq!(unmask_next(&hint, answer), "ab");
    }
}
