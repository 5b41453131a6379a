//! A worker serving one HTTP-triggered function that copies a blob.
//!
//! ```text
//! cargo run -p azrun --example copy_blob -- \
//!     --host 127.0.0.1 --port 50051 --workerId w1 --requestId r1 --grpcMaxMessageLength 2147483647
//! ```

use azrun::Context;
use azrun::Function;
use azrun::Logger;
use azrun::Record;
use azrun::Request;
use azrun::Response;
use azrun::StaticLoader;
use azrun::TypeDescriptor;
use azrun::WorkerConfig;

#[derive(Default, Record)]
struct CopyBlob {
    #[binding("req")]
    pub request: Request,
    #[binding("original")]
    pub blob: Vec<u8>,
    #[binding("copy")]
    pub copy: Vec<u8>,
    #[binding("res")]
    pub response: Response,
}

impl Function for CopyBlob {
    fn run(&mut self, ctx: &Context, logger: &Logger) {
        logger.info(format!(
            "{} {} copying {} bytes ({})",
            self.request.method,
            self.request.url,
            self.blob.len(),
            ctx.invocation_id()
        ));
        self.copy = self.blob.clone();
        self.response = Response::new(201).with_header("content-type", "text/plain").with_body("copied");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    azrun::logger::init_tracing();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("copy_blob: {}", e);
            std::process::exit(2);
        }
    };

    let loader = StaticLoader::new().with("CopyBlob", "", TypeDescriptor::function::<CopyBlob>());
    azrun::serve(&config, loader).await
}
