/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth::access (auth token gate), http (request id / trace / timeout),
 *   security_headers (http::apply の内側で適用)
 */
pub mod auth;
pub mod http;
pub mod security_headers;
