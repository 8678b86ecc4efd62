use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

/// Strings at least this long get their most frequent characters ignored as
/// match anchors.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Similarity ratio in `[0, 1]` computed as `2 * M / T`, where `M` is the
/// number of characters covered by the matching blocks found by recursive
/// longest-common-substring alignment and `T` is the combined length.
pub(crate) fn ratio(lhs: &str, rhs: &str) -> f64 {
  let lhs = lhs.chars().collect::<Vec<_>>();
  let rhs = rhs.chars().collect::<Vec<_>>();
  let total = lhs.len() + rhs.len();

  if total == 0 {
    return 1.0;
  }

  let matched = SequenceMatcher::new(&lhs, &rhs).matched_chars();

  2.0 * matched as f64 / total as f64
}

struct SequenceMatcher<'s> {
  a: &'s [char],
  b: &'s [char],
  b2j: HashMap<char, Vec<usize>>,
}

impl<'s> SequenceMatcher<'s> {
  fn new(a: &'s [char], b: &'s [char]) -> SequenceMatcher<'s> {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::with_capacity(b.len());

    for (index, c) in b.iter().enumerate() {
      b2j.entry(*c).or_default().push(index);
    }

    if b.len() >= AUTOJUNK_MIN_LEN {
      let threshold = b.len() / 100 + 1;
      let mut popular = HashSet::new();

      for (c, indices) in &b2j {
        if indices.len() > threshold {
          popular.insert(*c);
        }
      }

      for c in popular {
        b2j.remove(&c);
      }
    }

    SequenceMatcher { a, b, b2j }
  }

  fn matched_chars(&self) -> usize {
    let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
    let mut matched = 0;

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
      let (i, j, size) = self.find_longest_match(alo, ahi, blo, bhi);

      if size == 0 {
        continue;
      }

      matched += size;

      if alo < i && blo < j {
        queue.push((alo, i, blo, j));
      }
      if i + size < ahi && j + size < bhi {
        queue.push((i + size, ahi, j + size, bhi));
      }
    }

    matched
  }

  fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for i in alo..ahi {
      let mut next_run_lengths: HashMap<usize, usize> = HashMap::new();

      if let Some(indices) = self.b2j.get(&self.a[i]) {
        for &j in indices {
          if j < blo {
            continue;
          }
          if j >= bhi {
            break;
          }

          let size = match j {
            0 => 1,
            _ => run_lengths.get(&(j - 1)).copied().unwrap_or(0) + 1,
          };

          next_run_lengths.insert(j, size);

          if size > best_size {
            best_i = i + 1 - size;
            best_j = j + 1 - size;
            best_size = size;
          }
        }
      }

      run_lengths = next_run_lengths;
    }

    // Characters dropped from the index as too frequent can still extend a match on both ends.
    while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
      best_i -= 1;
      best_j -= 1;
      best_size += 1;
    }

    while best_i + best_size < ahi && best_j + best_size < bhi && self.a[best_i + best_size] == self.b[best_j + best_size] {
      best_size += 1;
    }

    (best_i, best_j, best_size)
  }
}
