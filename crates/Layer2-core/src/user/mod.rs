//! User - 사용자 계정과 세션 로그인
//!
//! - `password` - Argon2 해시, 일회용 토큰
//! - `store` - users 테이블 및 user_* 이벤트
//! - `session` - login / logout 리스너

mod password;
pub mod session;
mod store;

pub use password::{generate_onetime, hash_password, verify_password, MIN_PASSWORD_LEN};
pub use store::{AdminCredentials, Created, Updated, User, UserStore, ADMIN_NAME};
