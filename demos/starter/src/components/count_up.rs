use tally::prelude::*;

use crate::hooks::use_set_count;

/// Name of the click action [`CountUp`] registers.
pub const COUNT_UP_ACTION: &str = "count-up";

/// Button that bumps the shared count. Knows nothing about who displays it.
#[derive(Debug, Clone)]
pub struct CountUp {
    label: String,
}

impl Default for CountUp {
    fn default() -> Self {
        Self {
            label: "Count up via use_set_count".to_owned(),
        }
    }
}

impl CountUp {
    /// Button with a custom label.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl View for CountUp {
    fn render(&self, cx: &Scope) -> Html {
        let setter = use_set_count(cx);
        let on_click = cx.action(COUNT_UP_ACTION, action!(setter => { setter.count_up(); }));

        let mut html = Html::raw(format!(r#"<div><button type="button" class="button" {on_click}>"#));
        html.push(Html::text(&self.label));
        html.push(Html::raw("</button></div>"));
        html
    }
}
