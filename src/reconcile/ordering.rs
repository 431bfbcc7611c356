use std::collections::{HashMap, HashSet};

/// 제출 목록이 저장 목록과 대응하지 않는 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMismatch {
    /// 개수가 다름 (먼저 검사)
    Count { expected: usize, actual: usize },
    /// 개수는 같지만 id 집합이 다름 (id 누락 포함)
    Identity,
}

/// 제출된 항목을 저장된 순서대로 재정렬
/// 저장된 id 집합과 정확히 같은 집합이어야 하며, 제출 순서는 신뢰하지 않는다.
pub fn canonical_order<T, F>(
    stored_ids: &[&str],
    submitted: Vec<T>,
    id_of: F,
) -> Result<Vec<T>, OrderMismatch>
where
    F: Fn(&T) -> Option<&str>,
{
    if submitted.len() != stored_ids.len() {
        return Err(OrderMismatch::Count {
            expected: stored_ids.len(),
            actual: submitted.len(),
        });
    }

    let positions: HashMap<&str, usize> = stored_ids
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();
    {
        let submitted_ids: Option<HashSet<&str>> = submitted.iter().map(&id_of).collect();
        let stored_set: HashSet<&str> = positions.keys().copied().collect();
        if submitted_ids.as_ref() != Some(&stored_set) {
            return Err(OrderMismatch::Identity);
        }
    }

    let mut keyed: Vec<(usize, T)> = submitted
        .into_iter()
        .map(|item| {
            let position = id_of(&item)
                .and_then(|id| positions.get(id).copied())
                .unwrap_or(usize::MAX);
            (position, item)
        })
        .collect();
    // 안정 정렬
    keyed.sort_by_key(|(position, _)| *position);
    Ok(keyed.into_iter().map(|(_, item)| item).collect())
}
