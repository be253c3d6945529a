use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Строит fmt-слой выбранного формата поверх произвольного writer-а.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата.
pub fn build_layer<S, W>(
    format: LogFormat,
    console: &ConsoleConfig,
    writer: W,
    with_ansi: bool,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(console.with_target)
                .with_thread_ids(console.with_thread_ids)
                .with_line_number(console.with_line_numbers);
            Box::new(layer)
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .event_format(fmt::format().pretty())
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(console.with_target)
                .with_thread_ids(console.with_thread_ids)
                .with_line_number(console.with_line_numbers);
            Box::new(layer)
        }
        LogFormat::Compact => {
            // Compact - минимум информации
            let layer = fmt::layer()
                .event_format(fmt::format().compact())
                .with_writer(writer)
                .with_ansi(with_ansi)
                .with_target(console.with_target)
                .with_thread_ids(false)
                .with_line_number(false);
            Box::new(layer)
        }
    }
}
