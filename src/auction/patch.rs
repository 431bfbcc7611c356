use serde_json::Value;

/// 저장된 문서에 병합 패치 적용
/// - 객체: 키 단위 재귀 병합
/// - 배열: 위치 단위 병합 (빈 객체는 해당 위치를 그대로 둠, 남는 요소는 뒤에 추가)
/// - 그 외(스칼라, null): 교체
pub fn apply_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => apply_patch(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(patch)) => {
            for (index, value) in patch.iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => apply_patch(existing, value),
                    None => target.push(value.clone()),
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
