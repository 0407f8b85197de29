//! formreview API server binary
//!
//! HTTP REST API for evaluation-form templates.

use clap::Parser;
use formreview::api::run_api_server;
use formreview::config::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "formreview-server")]
#[command(version)]
#[command(about = "formreview API server - evaluation-form templates over HTTP")]
#[command(long_about = r#"
formreview API server

Template endpoints:
  - GET    /api/templates              - List templates (newest first)
  - GET    /api/templates/{key}        - Get one template
  - POST   /api/templates              - Upsert one template
  - POST   /api/templates/bulk         - Upsert one table under many keys
  - DELETE /api/templates/{key}        - Delete a template
  - POST   /api/templates/import       - Import a spreadsheet (multipart)
  - POST   /api/templates/import-bulk  - Import one spreadsheet for many keys
  - POST   /api/templates/preview      - Parse a spreadsheet without storing

Additional endpoints:
  - GET  /api/org                      - Org catalog
  - GET  /api/org/combinations         - Every branch/department/position key
  - GET  /health                       - Health check
  - GET  /version                      - Server version info

Example usage:
  formreview-server                              # localhost:3000, in-memory store
  formreview-server --host 0.0.0.0 --db templates.db --org-catalog org.yaml

  curl -F file=@form.xlsx -F branchId=hn -F departmentId=sales -F positionId=staff \
    http://localhost:3000/api/templates/import
"#)]
struct Args {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    run_api_server(args.serve.into_config()).await
}
