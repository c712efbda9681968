/**********************************************
  > File Name		: macros.rs
  > Author		    : lunar
  > Email			: lunar_ubuntu@qq.com
  > Created Time	: Fri 14 May 2021 10:34:16 AM CST
  > Location        : Shanghai
  > Copyright@ https://github.com/xiaoqixian
 **********************************************/

/*
 * Send an event to an optional trace sink.
 * The event expression is only evaluated when a sink is attached.
 */
#[macro_export]
macro_rules! trace_event {
    ($sink: expr, $event: expr) => {
        if let Some(sink) = $sink.as_mut() {
            sink.event(&$event);
        }
    };
}
