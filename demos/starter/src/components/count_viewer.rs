use tally::prelude::*;

use crate::hooks::use_count;

/// Shows the shared count. Renders an empty placeholder until it loads.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountViewer;

impl View for CountViewer {
    fn render(&self, cx: &Scope) -> Html {
        let value = match use_count(cx).count {
            Some(count) => format!(r#"<span class="count">{count}</span>"#),
            None => r#"<span class="count" data-state="loading"></span>"#.to_owned(),
        };

        Html::raw(format!(r#"<div class="count-viewer">Count: {value}</div>"#))
    }
}
