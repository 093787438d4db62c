use huaweicloud::HuaweiCloudProvider;
use tfplug::{serve, ServerConfig};

#[tokio::main]
async fn main() -> tfplug::Result<()> {
    serve(HuaweiCloudProvider::new(), ServerConfig::default()).await
}
