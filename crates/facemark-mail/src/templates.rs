//! Subject and body text for each [`Notification`].

use facemark_core::notify::Notification;

const DATE_FORMAT: &str = "%B %d, %Y";
const TIME_FORMAT: &str = "%I:%M %p";

const FOOTER: &str = "This is an automated message from the FaceMark attendance system.";

/// A notification rendered for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub subject: String,
  pub text:    String,
  pub html:    String,
}

pub fn render(notification: &Notification) -> Rendered {
  match notification {
    Notification::Confirmation { name, date, time } => {
      let date = date.format(DATE_FORMAT).to_string();
      let time = time.format(TIME_FORMAT).to_string();
      let text = format!(
        "Hello {name}!\n\n\
         Your attendance has been recorded.\n\n\
         Date:   {date}\n\
         Time:   {time}\n\
         Status: Present\n\n\
         {FOOTER} If you have any questions, please contact your administrator.\n"
      );
      let html = html_page("Attendance Confirmed", "#28a745", &format!(
        "<h2>Hello {name}!</h2>\
         <p>Your attendance has been recorded.</p>\
         <p><strong>Date:</strong> {date}<br>\
         <strong>Time:</strong> {time}<br>\
         <strong>Status:</strong> Present</p>",
        name = escape(name),
      ));
      Rendered { subject: "Attendance Confirmed - FaceMark".into(), text, html }
    }

    Notification::Absence { name, date, cutoff } => {
      let date = date.format(DATE_FORMAT).to_string();
      let text = format!(
        "Hello {name},\n\n\
         You have no attendance record for {date}.\n\n\
         Date:        {date}\n\
         Cutoff time: {cutoff}\n\
         Status:      Absent\n\n\
         If you were present but not detected, contact your administrator.\n\n\
         {FOOTER}\n"
      );
      let html = html_page("Absence Alert", "#dc3545", &format!(
        "<h2>Hello {name},</h2>\
         <p>You have no attendance record for {date}.</p>\
         <p><strong>Date:</strong> {date}<br>\
         <strong>Cutoff time:</strong> {cutoff}<br>\
         <strong>Status:</strong> Absent</p>\
         <p>If you were present but not detected, contact your administrator.</p>",
        name = escape(name),
      ));
      Rendered { subject: "Absence Alert - FaceMark".into(), text, html }
    }
  }
}

fn html_page(title: &str, accent: &str, content: &str) -> String {
  format!(
    "<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
     <h1 style=\"color: {accent};\">{title}</h1>\
     {content}\
     <p style=\"color: #999; font-size: 12px;\">{FOOTER}</p>\
     </body></html>"
  )
}

fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}
