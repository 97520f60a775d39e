//! 플러그인 콜백 격리
//!
//! 플러그인 코드가 에러를 반환하거나 패닉하더라도 호스트는 계속 진행합니다.

use std::panic::{catch_unwind, AssertUnwindSafe};
use volley_foundation::Result;

/// 콜백 실행 - 에러와 패닉 모두 메시지로 변환
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_foundation::Error;

    #[test]
    fn test_guarded_ok_and_err() {
        assert_eq!(guarded(|| Ok(3)).unwrap(), 3);
        let err = guarded::<()>(|| Err(Error::Validation("bad".into()))).unwrap_err();
        assert_eq!(err, "Validation error: bad");
    }

    #[test]
    fn test_guarded_panic() {
        let err = guarded::<()>(|| panic!("handler exploded")).unwrap_err();
        assert_eq!(err, "panicked: handler exploded");
    }
}
