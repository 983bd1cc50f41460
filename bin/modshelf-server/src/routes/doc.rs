use crate::routes::{admin, download, health, items, upload};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "modshelf-server",
    description = "modshelf content catalog and file distribution API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(items::ItemsApi::openapi());
    root.merge(upload::UploadApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root.merge(admin::AdminApi::openapi());
    root
}
