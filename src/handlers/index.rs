// src/handlers/index.rs
use actix_web::HttpResponse;

pub const ROUTES: [&str; 3] = ["/healthz", "/rcon/", "/api"];

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(render_index(&ROUTES))
}

fn render_index(routes: &[&str]) -> String {
    let links: String = routes
        .iter()
        .map(|route| format!("<a href=\"{0}\">{0}</a><br>", route))
        .collect();
    format!("<html><body>{}</body></html>", links)
}
