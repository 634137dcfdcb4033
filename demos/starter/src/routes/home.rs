use tally::prelude::*;

use crate::components::{CountUp, CountViewer};

/// Landing page: the count and the button that bumps it, side by side.
#[derive(Debug, Default, Clone)]
pub struct Home {
    viewer: CountViewer,
    count_up: CountUp,
}

impl View for Home {
    fn render(&self, cx: &Scope) -> Html {
        [
            Html::raw(r#"<main class="home">"#),
            Html::raw("<h1>Welcome to the Tally Starter Kit!!</h1>"),
            self.viewer.render(cx),
            self.count_up.render(cx),
            Html::raw("</main>"),
        ]
        .into_iter()
        .collect()
    }
}
