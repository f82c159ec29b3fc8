use keymap::KeyMap;

#[derive(KeyMap, Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Quit the application
    #[key("q")]
    Quit,
    /// Return to the initial registers
    #[key("r")]
    Reset,
    /// Apply one fraction
    #[key("space")]
    Step,
    /// Start or stop playback
    #[key("p")]
    TogglePlay,
    /// Toggle help display
    #[key("h")]
    ToggleHelp,
    /// Load the previous preset
    #[key("left")]
    PreviousProgram,
    /// Load the next preset
    #[key("right")]
    NextProgram,
    /// Scrub one state back in history
    #[key("b")]
    ScrubBack,
    /// Scrub one state forward in history
    #[key("n")]
    ScrubForward,
    /// Increase playback speed
    #[key("f")]
    Faster,
    /// Decrease playback speed
    #[key("s")]
    Slower,
    /// Select the previous editable register
    #[key("up")]
    SelectUp,
    /// Select the next editable register
    #[key("down")]
    SelectDown,
    /// Increment the selected register
    #[key("i")]
    Increment,
    /// Decrement the selected register
    #[key("d")]
    Decrement,
}
