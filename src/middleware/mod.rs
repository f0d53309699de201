pub mod current_user;
pub mod extractors;
pub mod request_id;

pub use current_user::{CurrentUser, Superuser, USER_ID_HEADER};
pub use extractors::{JsonBody, MultipartForm, PathParam, QueryParams, ValidatedJson};
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
