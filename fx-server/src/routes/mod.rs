pub mod fx_rate;
pub mod transfer;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/fx-rate", web::post().to(fx_rate::record_rate))
        .route("/fx-rate/{pair}", web::get().to(fx_rate::latest_rate))
        .route("/transfer", web::post().to(transfer::create_transfer))
        .route("/transfer/{id}", web::get().to(transfer::get_transfer));
}
