use crate::domain::builder::{CallTreeBuilder, CancelToken};
use crate::domain::calltree::{BuildStatus, CalledByIndex};
use crate::ports::TreeExporter;

/// One navigation request: build the tree for a symbol and hand the
/// result to an exporter.
pub struct NavigateUsecase<'a> {
    pub exporter: &'a dyn TreeExporter,
}

impl<'a> NavigateUsecase<'a> {
    pub fn run(
        &self,
        builder: &CallTreeBuilder,
        name: &str,
        file: &str,
        line: u32,
        called_by: bool,
        cancel: &CancelToken,
        export_path: &str,
    ) -> anyhow::Result<BuildStatus> {
        let outcome = if called_by {
            let index = CalledByIndex::build(builder.database());
            builder.build_called_by(name, file, line, &index, cancel, None)
        } else {
            builder.build(name, file, line, cancel, None)
        };
        self.exporter
            .export(&outcome.tree, builder.database(), export_path)?;
        Ok(outcome.status)
    }
}
